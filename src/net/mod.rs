//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Unix stream connection
//!     → listener.rs (accept, attach tracking guard)
//!     → tracker.rs (outstanding-connection count)
//!     → connection.rs (read one line, write reply, close)
//!     → Hand off to routing layer
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked until its worker finishes
//! - Connections are owned by exactly one worker and never shared

pub mod connection;
pub mod listener;
pub mod tracker;

pub use connection::{Connection, ConnectionError};
pub use listener::{Listener, ListenerError};
pub use tracker::{ConnectionGuard, ConnectionId, ConnectionTracker};
