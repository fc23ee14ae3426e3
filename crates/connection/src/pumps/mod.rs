//! Read, write, and heartbeat pumps for an active WebSocket session.

mod heartbeat;
mod read;
mod write;

pub(crate) use heartbeat::heartbeat_pump;
pub(crate) use read::read_pump;
pub(crate) use write::write_pump;
