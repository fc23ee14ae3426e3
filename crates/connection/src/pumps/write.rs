//! WebSocket write pump — serialises outbound frames onto the socket.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Forwards channel messages to the WebSocket, one at a time.
///
/// A `Close` message coming through the channel (the manual disconnect
/// path) is forwarded as-is and ends the pump; every other exit path sends
/// its own `Close(None)` so the peer always sees a close frame.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break "cancelled",
            msg = write_rx.recv() => match msg {
                Some(tungstenite::Message::Close(frame)) => {
                    let _ = write.send(tungstenite::Message::Close(frame)).await;
                    let _ = write.flush().await;
                    debug!("write pump stopped: close requested");
                    return;
                }
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        warn!("WebSocket write error: {e}");
                        break "write error";
                    }
                }
                None => break "channel closed",
            },
        }
    };

    debug!(reason, "write pump stopped");
    let _ = write.send(tungstenite::Message::Close(None)).await;
}
