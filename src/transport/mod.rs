//! Snapshot transport
//!
//! Wire messages and the session that maps them onto the allocator, plus
//! the WebSocket client when the `client` feature is enabled.

#[cfg(feature = "client")]
pub mod client;
pub mod messages;
pub mod session;

#[cfg(feature = "client")]
pub use client::{ClientError, SnapshotClient};
pub use messages::*;
pub use session::{RecordedResult, Session, SessionError};
