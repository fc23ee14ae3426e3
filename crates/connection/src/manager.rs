//! Connection manager for the persistent Bridge channel.
//!
//! Keeps one logical WebSocket connection alive, reconnecting with
//! exponential backoff on unexpected disconnects, and exposes send
//! primitives that tolerate transient disconnection by queueing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;
use tracing::{debug, info};

use armorlink_protocol::OutboundFrame;
use armorlink_protocol::events::InboundEvent;

use crate::ConnectionError;
use crate::queue::OutboundQueue;
use crate::reconnect::{
    ConnContext, cancel_active_connection, cancel_any_reconnect, establish, schedule_reconnect,
    teardown_connection,
};
use crate::types::{ConnectionConfig, ConnectionState};

/// Manages the WebSocket connection to a Bridge.
pub struct ConnectionManager {
    ctx: ConnContext,
    state_rx: watch::Receiver<ConnectionState>,
    events_rx: std::sync::Mutex<Option<mpsc::Receiver<InboundEvent>>>,
}

impl ConnectionManager {
    /// Creates a manager for the given device and Bridge WebSocket URL.
    /// No connection is attempted until [`connect`](Self::connect).
    pub fn new(device_id: impl Into<String>, url: impl Into<String>, config: ConnectionConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::channel(64);
        let queue = Arc::new(OutboundQueue::new(config.queue_capacity));

        let ctx = ConnContext {
            device_id: device_id.into(),
            url: url.into(),
            config,
            state_tx: Arc::new(state_tx),
            events_tx,
            queue,
            write_tx: Arc::new(std::sync::Mutex::new(None)),
            conn_cancel: Arc::new(std::sync::Mutex::new(None)),
            reconnect_cancel: Arc::new(std::sync::Mutex::new(None)),
            attempts: Arc::new(AtomicU32::new(0)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
        };

        Self {
            ctx,
            state_rx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
        }
    }

    /// Opens the connection. No-op while already `Connecting` or
    /// `Connected`. On failure the state moves to `Error` and a reconnect
    /// is scheduled; the error is also returned for the direct caller.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        if matches!(
            *self.state_rx.borrow(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!("connect ignored, already connecting or connected");
            return Ok(());
        }

        self.ctx.manual_disconnect.store(false, Ordering::Relaxed);
        cancel_any_reconnect(&self.ctx.reconnect_cancel);

        let result = establish(&self.ctx).await;

        // A concurrent disconnect outranks whatever the attempt did.
        if self.ctx.manual_disconnect.load(Ordering::Relaxed) {
            teardown_connection(&self.ctx);
            return result;
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.ctx.set_state(ConnectionState::Error(e.to_string()));
                schedule_reconnect(self.ctx.clone());
                Err(e)
            }
        }
    }

    /// Closes the connection (user-initiated). Cancels any pending
    /// reconnect; this is the only path that prevents one from firing.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        self.ctx.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_any_reconnect(&self.ctx.reconnect_cancel);

        let sender = self
            .ctx
            .write_tx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(tx) = sender {
            let frame = tungstenite::protocol::CloseFrame {
                code: code.into(),
                reason: reason.to_string().into(),
            };
            let _ = tx.send(tungstenite::Message::Close(Some(frame))).await;
        }

        cancel_active_connection(&self.ctx.conn_cancel);
        self.ctx.set_state(ConnectionState::Disconnected);
        info!(code, reason, "disconnected");
    }

    /// Sends a text frame. While `Connected` this hands the frame to the
    /// transport and reports its success; otherwise the frame is queued
    /// for the next connect, and `false` means the queue was full.
    pub fn send(&self, message: &str) -> bool {
        if *self.state_rx.borrow() == ConnectionState::Connected {
            let sender = self
                .ctx
                .write_tx
                .lock()
                .ok()
                .and_then(|guard| guard.clone());
            if let Some(tx) = sender {
                return tx
                    .try_send(tungstenite::Message::Text(message.to_string().into()))
                    .is_ok();
            }
        }
        self.ctx.queue.push(message.to_string())
    }

    /// Serializes an RPC frame and sends it via [`send`](Self::send).
    pub fn send_rpc(&self, method: &str, params: serde_json::Value, id: u64) -> bool {
        match OutboundFrame::rpc(method, params, id).to_json() {
            Ok(json) => self.send(&json),
            Err(_) => false,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribes to state changes. The receiver starts at the current
    /// snapshot and observes every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Takes the inbound event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<InboundEvent>> {
        self.events_rx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Number of reconnect attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.ctx.attempts.load(Ordering::Relaxed)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        cancel_any_reconnect(&self.ctx.reconnect_cancel);
        cancel_active_connection(&self.ctx.conn_cancel);
    }
}
