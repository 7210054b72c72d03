//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection
//!     → router.rs (read one line, look up rules under the read lock)
//!     → matcher.rs (regex find, collect named groups)
//!     → request.rs (raw line + captures)
//!     → handler.rs (matched handler, default handler, or drop)
//!
//! Registration (any time):
//!     pattern text
//!     → compile (fails synchronously on bad syntax)
//!     → append rule under the write lock
//! ```
//!
//! # Design Decisions
//! - First match wins, in registration order
//! - No priority or longest-match preference
//! - Handlers own the connection and close it themselves

pub mod handler;
pub mod matcher;
pub mod reply;
pub mod request;
pub mod router;

pub use handler::{BoxedHandler, Handler};
pub use matcher::LinePattern;
pub use reply::ReplyTemplate;
pub use request::Request;
pub use router::{DispatchOutcome, RouterError, ServeMux, DEFAULT_BUFFER_SIZE};
