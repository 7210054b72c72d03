//! Pattern-routed request multiplexer for line-oriented Unix sockets.
//!
//! A [`ServeMux`] listens on a Unix socket path, reads one line from every
//! accepted connection, and hands the connection to the first handler whose
//! pattern matches that line, together with the pattern's named captures.
//!
//! ```no_run
//! use socket_mux::{Connection, Request, ServeMux, Shutdown};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mux = ServeMux::new();
//! mux.handle_func(
//!     "^hello (?P<name>\\w+)$",
//!     |mut conn: Connection, req: Request| async move {
//!         let reply = format!("hello {}", req.get("name").unwrap_or_default());
//!         let _ = conn.write(reply.as_bytes()).await;
//!         let _ = conn.close().await;
//!     },
//! )?;
//!
//! let shutdown = Shutdown::new();
//! mux.listen_and_serve(&shutdown, "/tmp/hello.sock").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::MuxConfig;
pub use lifecycle::Shutdown;
pub use net::{Connection, ConnectionError, ConnectionTracker, ListenerError};
pub use routing::{DispatchOutcome, Handler, Request, RouterError, ServeMux};
