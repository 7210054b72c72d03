//! Handler abstraction shared by pattern routes and the default route.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::net::Connection;
use crate::routing::request::Request;

/// Something that can answer one command line.
///
/// The handler owns the connection: it writes the response and closes it.
/// Nothing is closed automatically after it returns, beyond the socket
/// being released when the connection is dropped.
///
/// Implemented for every `Fn(Connection, Request) -> impl Future<Output = ()>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, conn: Connection, req: Request) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Connection, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, conn: Connection, req: Request) -> BoxFuture<'static, ()> {
        (self)(conn, req).boxed()
    }
}

/// Shared, type-erased handler as stored in the route table.
pub type BoxedHandler = Arc<dyn Handler>;

/// Fallback installed by the serve loop when no default handler was set:
/// close without writing anything.
pub(crate) fn close_connection() -> BoxedHandler {
    Arc::new(|mut conn: Connection, _req: Request| async move {
        if let Err(e) = conn.close().await {
            tracing::debug!(connection_id = %conn.id(), error = %e, "Close failed");
        }
    })
}
