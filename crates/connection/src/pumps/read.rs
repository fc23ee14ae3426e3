//! WebSocket read pump — decodes and dispatches inbound frames.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use armorlink_protocol::constants::WS_MAX_MESSAGE_SIZE;
use armorlink_protocol::events::InboundEvent;

/// Reads frames from the WebSocket until the connection drops or is
/// cancelled. Each text frame is decoded into an [`InboundEvent`] and
/// forwarded to the event channel; decode never fails, unknown frames
/// arrive as [`InboundEvent::Unknown`].
///
/// Returns the disconnect reason, or `None` when the pump was cancelled
/// (a deliberate shutdown that must not trigger a reconnect).
pub(crate) async fn read_pump<S>(
    mut read: S,
    events_tx: mpsc::Sender<InboundEvent>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) -> Option<String>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if text.len() > WS_MAX_MESSAGE_SIZE {
                            warn!("frame too large ({} bytes), dropping", text.len());
                            continue;
                        }
                        let event = InboundEvent::decode(&text);
                        trace!(?event, "inbound event");
                        match events_tx.try_send(event) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(event)) => {
                                // Never stall the socket behind a slow
                                // consumer.
                                warn!(?event, "event consumer lagging, dropping frame");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                // Receiver dropped — nobody is listening anymore.
                                return Some("event channel closed".into());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        debug!("received close frame");
                        let reason = frame
                            .map(|f| format!("closed by peer: {} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "closed by peer".into());
                        return Some(reason);
                    }
                    Some(Ok(_)) => {} // Pong / Binary — ignore
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        return Some(format!("read error: {e}"));
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return Some("stream ended".into());
                    }
                }
            }
        }
    }
}
