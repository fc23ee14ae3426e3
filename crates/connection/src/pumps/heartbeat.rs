//! Heartbeat pump — periodic application-level ping frames.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use armorlink_protocol::OutboundFrame;

/// Sends a `{"type":"ping"}` text frame on every interval tick while the
/// connection is alive. Cancelled together with the owning connection, so
/// it never outlives it.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip immediate first tick.

    let frame = match OutboundFrame::ping().to_json() {
        Ok(json) => json,
        Err(_) => return,
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let msg = tungstenite::Message::Text(frame.clone().into());
                if write_tx.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }
}
