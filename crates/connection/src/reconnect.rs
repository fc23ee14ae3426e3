//! Connection establishment and reconnection with exponential backoff.
//!
//! Contains the shared [`ConnContext`], cancellation helpers, the connect
//! routine that wires up the pumps, and the reconnect loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use armorlink_protocol::OutboundFrame;
use armorlink_protocol::events::InboundEvent;

use crate::ConnectionError;
use crate::pumps::{heartbeat_pump, read_pump, write_pump};
use crate::queue::OutboundQueue;
use crate::types::{ConnectionConfig, ConnectionState};

/// Shared state passed to the free functions that establish connections
/// and run the reconnect loop. Avoids threading ten separate Arc
/// parameters.
#[derive(Clone)]
pub(crate) struct ConnContext {
    pub(crate) device_id: String,
    pub(crate) url: String,
    pub(crate) config: ConnectionConfig,
    pub(crate) state_tx: Arc<watch::Sender<ConnectionState>>,
    pub(crate) events_tx: mpsc::Sender<InboundEvent>,
    pub(crate) queue: Arc<OutboundQueue>,
    /// Write half of the active connection; `None` while disconnected.
    pub(crate) write_tx: Arc<std::sync::Mutex<Option<mpsc::Sender<tungstenite::Message>>>>,
    /// Cancel token for the pumps of the active connection.
    pub(crate) conn_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    /// Cancel token for the active reconnect loop.
    pub(crate) reconnect_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    pub(crate) attempts: Arc<AtomicU32>,
    /// Set to true when the user explicitly disconnects.
    pub(crate) manual_disconnect: Arc<AtomicBool>,
}

impl ConnContext {
    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

/// Cancels any active reconnect loop.
pub(crate) fn cancel_any_reconnect(
    reconnect_cancel: &std::sync::Mutex<Option<CancellationToken>>,
) {
    if let Ok(mut guard) = reconnect_cancel.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Cancels the pumps of the active connection, if any.
pub(crate) fn cancel_active_connection(
    conn_cancel: &std::sync::Mutex<Option<CancellationToken>>,
) {
    if let Ok(mut guard) = conn_cancel.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Opens the WebSocket, wires up the pumps, registers, and flushes the
/// outbound queue. On success the state is `Connected` and the attempt
/// counter is reset. On failure the state is left as `Connecting`; the
/// caller decides between `Error` plus a scheduled reconnect (manual
/// connect) and continuing the loop (reconnect attempt).
pub(crate) async fn establish(ctx: &ConnContext) -> Result<(), ConnectionError> {
    ctx.set_state(ConnectionState::Connecting);
    debug!(url = %ctx.url, "connecting");

    let (stream, _) = connect_async(&ctx.url).await?;

    // A disconnect may have landed while the handshake was in flight; it
    // must win before anything observable happens.
    if ctx.manual_disconnect.load(Ordering::Relaxed) {
        return Err(ConnectionError::Closed);
    }

    let (write, read) = stream.split();

    // Replace any leftover pumps from a previous connection.
    cancel_active_connection(&ctx.conn_cancel);
    let cancel = CancellationToken::new();
    if let Ok(mut guard) = ctx.conn_cancel.lock() {
        *guard = Some(cancel.clone());
    }

    let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);

    tokio::spawn(write_pump(write, write_rx, cancel.clone()));
    tokio::spawn(heartbeat_pump(
        write_tx.clone(),
        ctx.config.heartbeat_interval,
        cancel.clone(),
    ));

    let read_ctx = ctx.clone();
    let read_cancel = cancel.clone();
    let read_events = ctx.events_tx.clone();
    let read_write_tx = write_tx.clone();
    tokio::spawn(async move {
        let reason = read_pump(read, read_events, read_write_tx, read_cancel.clone()).await;
        // Take down the sibling pumps of this connection.
        read_cancel.cancel();
        if let Some(reason) = reason {
            handle_disconnect(&read_ctx, reason);
        }
    });

    if let Ok(mut guard) = ctx.write_tx.lock() {
        *guard = Some(write_tx.clone());
    }

    ctx.attempts.store(0, Ordering::Relaxed);
    ctx.set_state(ConnectionState::Connected);
    info!(url = %ctx.url, "connected");

    // Registration frame first, then any frames queued while offline.
    let register = OutboundFrame::register(ctx.device_id.clone()).to_json()?;
    if write_tx
        .send(tungstenite::Message::Text(register.into()))
        .await
        .is_err()
    {
        return Err(ConnectionError::Closed);
    }
    flush_queue(&ctx.queue, &write_tx).await;

    Ok(())
}

/// Drains the outbound queue in FIFO order. Best-effort: the flush stops
/// for this pass on the first frame that fails to hand off.
async fn flush_queue(queue: &OutboundQueue, write_tx: &mpsc::Sender<tungstenite::Message>) {
    while let Some(frame) = queue.pop() {
        if write_tx
            .send(tungstenite::Message::Text(frame.into()))
            .await
            .is_err()
        {
            warn!("connection dropped during queue flush");
            break;
        }
    }
}

/// Tears down whatever `establish` set up and settles on `Disconnected`.
/// Used when a disconnect raced a connection attempt.
pub(crate) fn teardown_connection(ctx: &ConnContext) {
    cancel_active_connection(&ctx.conn_cancel);
    if let Ok(mut guard) = ctx.write_tx.lock() {
        *guard = None;
    }
    ctx.set_state(ConnectionState::Disconnected);
}

/// Reacts to a connection loss reported by the read pump. Manual
/// disconnects were already handled by `disconnect`; anything else
/// surfaces as `Error(reason)` and schedules a reconnect.
pub(crate) fn handle_disconnect(ctx: &ConnContext, reason: String) {
    if let Ok(mut guard) = ctx.write_tx.lock() {
        *guard = None;
    }

    if ctx.manual_disconnect.load(Ordering::Relaxed) {
        debug!("disconnect was user-initiated, not reconnecting");
        return;
    }

    warn!(%reason, "connection lost");
    ctx.set_state(ConnectionState::Error(reason));
    schedule_reconnect(ctx.clone());
}

/// Replaces any pending reconnect loop with a fresh one.
pub(crate) fn schedule_reconnect(ctx: ConnContext) {
    let cancel = CancellationToken::new();
    cancel_any_reconnect(&ctx.reconnect_cancel);
    if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
        *guard = Some(cancel.clone());
    }
    tokio::spawn(reconnect_loop(ctx, cancel));
}

/// Reconnection loop with exponential backoff. Runs until a connect
/// succeeds or the loop is cancelled.
pub(crate) async fn reconnect_loop(ctx: ConnContext, cancel: CancellationToken) {
    loop {
        let attempt = ctx.attempts.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let delay = ctx.config.delay_for_attempt(attempt);

        info!(
            attempt,
            delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
            "reconnecting"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        // A racing manual connect may have won while we slept.
        if *ctx.state_tx.borrow() == ConnectionState::Connected {
            break;
        }

        let result = establish(&ctx).await;

        // A disconnect during the attempt wins, even over a completed
        // handshake.
        if ctx.manual_disconnect.load(Ordering::Relaxed) {
            teardown_connection(&ctx);
            return;
        }
        if cancel.is_cancelled() {
            return;
        }

        match result {
            Ok(()) => break,
            Err(e) => {
                warn!(attempt, error = %e, "reconnect attempt failed");
                ctx.set_state(ConnectionState::Error(e.to_string()));
            }
        }
    }

    // Clean up the cancel token unless a newer loop replaced it.
    if !cancel.is_cancelled()
        && let Ok(mut guard) = ctx.reconnect_cancel.lock()
    {
        *guard = None;
    }
}
