//! Public types for the connection manager.

use std::time::Duration;

/// Connection state for the Bridge channel. Exactly one active at a time;
/// observers receive a stream of these via [`ConnectionManager::subscribe`].
///
/// [`ConnectionManager::subscribe`]: crate::ConnectionManager::subscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Connected and registered.
    Connected,
    /// Connection lost or failed; a reconnect is pending unless the
    /// disconnect was user-initiated.
    Error(String),
}

/// Configuration for the connection lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delay before the first reconnection attempt.
    pub initial_backoff: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_backoff: Duration,
    /// Jitter amplitude as a fraction of the capped delay.
    pub jitter_factor: f64,
    /// Lower bound on any computed delay.
    pub floor_delay: Duration,
    /// Interval between application-level ping frames while connected.
    pub heartbeat_interval: Duration,
    /// Capacity of the outbound queue used while disconnected.
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.3,
            floor_delay: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(30),
            queue_capacity: 100,
        }
    }
}

impl ConnectionConfig {
    /// Calculates the delay for a given attempt number (1-based):
    /// exponential growth capped at `max_backoff`, with uniform jitter of
    /// ±`jitter_factor`, never below `floor_delay` and never above the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let exponential = self.initial_backoff.as_secs_f64() * 2f64.powi(exp);
        let capped = exponential.min(self.max_backoff.as_secs_f64());
        let jitter = capped * self.jitter_factor * uniform_offset();
        let delay = (capped + jitter).clamp(
            self.floor_delay.as_secs_f64(),
            self.max_backoff.as_secs_f64(),
        );
        Duration::from_secs_f64(delay)
    }
}

/// Clock-derived uniform sample in [-1.0, 1.0).
fn uniform_offset() -> f64 {
    (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64
        / u32::MAX as f64)
        * 2.0
        - 1.0
}
