//! Client session handling
//!
//! - `manager`: the single live session, its send path and teardown
//! - `reader`: per-session loop reading client frames
//! - `dispatch`: replies to inbound messages

mod dispatch;
mod manager;
mod reader;

pub use dispatch::dispatch;
pub use manager::{ConnectionManager, SessionHandle, SessionState};
