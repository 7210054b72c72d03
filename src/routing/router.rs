//! Route registration, the accept loop, and per-connection dispatch.
//!
//! # Responsibilities
//! - Store compiled pattern rules and the optional default handler
//! - Accept connections and spawn one worker per connection
//! - Read one line, pick the first matching rule, invoke its handler
//!
//! # Design Decisions
//! - Rules are tried in registration order; first match wins
//! - Registering the same pattern text twice adds a second, unreachable rule
//! - One reader/writer lock guards the rules and the default handler; it is
//!   released before any handler runs
//! - `Ok(())` from the serve loop means shutdown was requested; accept
//!   failures come back as `Err`

use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::net::UnixStream;

use crate::config::MuxConfig;
use crate::lifecycle::Shutdown;
use crate::net::{Connection, ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::handler::{self, BoxedHandler, Handler};
use crate::routing::matcher::LinePattern;
use crate::routing::reply::ReplyTemplate;
use crate::routing::request::Request;

/// Bytes requested by the single read of each command line.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Error type for route registration.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The pattern text is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How a connection left the dispatch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered pattern matched and its handler ran.
    Matched,
    /// Nothing matched and the default handler ran.
    Default,
    /// The connection was dropped: shutdown, read failure, or no handler.
    Dropped,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Matched => "matched",
            DispatchOutcome::Default => "default",
            DispatchOutcome::Dropped => "dropped",
        }
    }
}

struct PatternRule {
    pattern: LinePattern,
    handler: BoxedHandler,
}

#[derive(Default)]
struct Routes {
    rules: Vec<PatternRule>,
    default_handler: Option<BoxedHandler>,
}

/// The handler picked for one line, chosen under the read lock.
struct Selected {
    handler: Option<BoxedHandler>,
    request: Request,
    outcome: DispatchOutcome,
}

/// Pattern-based multiplexer for line-oriented Unix socket connections.
///
/// Cloning is cheap and every clone shares the same route table and
/// connection tracker.
#[derive(Clone)]
pub struct ServeMux {
    routes: Arc<RwLock<Routes>>,
    buffer_size: usize,
    tracker: ConnectionTracker,
}

impl ServeMux {
    /// Create a router with no rules and the default buffer size.
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(Routes::default())),
            buffer_size: DEFAULT_BUFFER_SIZE,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build a router serving the reply routes declared in `config`.
    pub fn from_config(config: &MuxConfig) -> Result<Self, RouterError> {
        let mux = Self::new().with_buffer_size(config.listener.buffer_size);

        for route in &config.routes {
            let reply = ReplyTemplate::new(&route.pattern, route.reply.clone()).map_err(|source| {
                RouterError::Compile {
                    pattern: route.pattern.clone(),
                    source,
                }
            })?;
            mux.handle_func(&route.pattern, reply.into_handler())?;
            tracing::info!(route = %route.name, pattern = %route.pattern, "Route loaded");
        }

        if let Some(text) = &config.default_reply {
            mux.handle_default_func(ReplyTemplate::literal(text.clone()).into_handler());
        }

        Ok(mux)
    }

    /// Set how many bytes each command-line read requests. Zero restores the
    /// default.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Register `handler` for lines matching `pattern`.
    ///
    /// Fails without side effects if the pattern does not compile.
    pub fn handle_func<H: Handler>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        let pattern = LinePattern::compile(pattern).map_err(|source| RouterError::Compile {
            pattern: pattern.to_string(),
            source,
        })?;

        tracing::debug!(pattern = pattern.as_str(), "Route registered");
        self.write_routes().rules.push(PatternRule {
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Set the handler for lines no pattern matches, replacing any previous one.
    pub fn handle_default_func<H: Handler>(&self, handler: H) {
        self.write_routes().default_handler = Some(Arc::new(handler));
    }

    /// Number of registered pattern rules.
    pub fn rule_count(&self) -> usize {
        self.read_routes().rules.len()
    }

    pub fn has_default_handler(&self) -> bool {
        self.read_routes().default_handler.is_some()
    }

    /// Outstanding-connection counter for callers that want to drain.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Bind `socket_path` and serve connections until `shutdown` fires.
    ///
    /// Each accepted connection gets its own task; the loop never waits on a
    /// handler. Returns `Ok(())` once shutdown is requested, without waiting
    /// for in-flight handlers (see [`connections`](Self::connections)).
    pub async fn listen_and_serve(
        &self,
        shutdown: &Shutdown,
        socket_path: impl AsRef<Path>,
    ) -> Result<(), ListenerError> {
        self.install_fallback_handler();

        let listener = Listener::bind(socket_path.as_ref(), self.tracker.clone())?;

        tracing::info!(
            path = %listener.path().display(),
            rules = self.rule_count(),
            buffer_size = self.buffer_size,
            "Serving socket connections"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, guard) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Accept loop stopped");
                    return Err(e);
                }
            };

            let mux = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let id = guard.id();
                let _guard = guard;
                mux.dispatch(stream, id, &shutdown).await;
            });
        }

        tracing::info!(path = %listener.path().display(), "Shutdown requested, listener closed");
        Ok(())
    }

    /// Run the dispatch worker for one already-accepted stream.
    ///
    /// This is what the serve loop runs per connection, for callers that
    /// accept connections themselves. The connection is not tracked.
    pub async fn serve_connection(
        &self,
        stream: UnixStream,
        shutdown: &Shutdown,
    ) -> DispatchOutcome {
        self.dispatch(stream, ConnectionId::new(), shutdown).await
    }

    async fn dispatch(
        &self,
        stream: UnixStream,
        id: ConnectionId,
        shutdown: &Shutdown,
    ) -> DispatchOutcome {
        let outcome = self.dispatch_inner(stream, id, shutdown).await;
        metrics::record_dispatch(outcome.as_str());
        outcome
    }

    async fn dispatch_inner(
        &self,
        stream: UnixStream,
        id: ConnectionId,
        shutdown: &Shutdown,
    ) -> DispatchOutcome {
        if shutdown.is_triggered() {
            tracing::debug!(connection_id = %id, "Shutdown in progress, dropping connection");
            return DispatchOutcome::Dropped;
        }

        let mut conn = Connection::with_id(stream, id);
        let line = match conn.read_line(self.buffer_size).await {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Dropping connection");
                return DispatchOutcome::Dropped;
            }
        };

        let Selected {
            handler,
            request,
            outcome,
        } = self.select(line);

        match handler {
            Some(handler) => {
                tracing::trace!(connection_id = %id, outcome = outcome.as_str(), "Dispatching");
                handler.call(conn, request).await;
            }
            None => {
                tracing::debug!(
                    connection_id = %id,
                    line = request.raw_line(),
                    "No route matched and no default handler"
                );
            }
        }

        outcome
    }

    fn select(&self, line: String) -> Selected {
        let routes = self.read_routes();

        for rule in &routes.rules {
            if let Some(vars) = rule.pattern.captures(&line) {
                return Selected {
                    handler: Some(Arc::clone(&rule.handler)),
                    request: Request::with_vars(line, vars),
                    outcome: DispatchOutcome::Matched,
                };
            }
        }

        match &routes.default_handler {
            Some(handler) => Selected {
                handler: Some(Arc::clone(handler)),
                request: Request::new(line),
                outcome: DispatchOutcome::Default,
            },
            None => Selected {
                handler: None,
                request: Request::new(line),
                outcome: DispatchOutcome::Dropped,
            },
        }
    }

    fn install_fallback_handler(&self) {
        let mut routes = self.write_routes();
        if routes.default_handler.is_none() {
            tracing::debug!("No default handler set, unmatched connections will be closed");
            routes.default_handler = Some(handler::close_connection());
        }
    }

    // Handlers never run under the lock, so a poisoned lock still holds a
    // consistent route table.
    fn read_routes(&self) -> RwLockReadGuard<'_, Routes> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_routes(&self) -> RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ServeMux {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMux")
            .field("rules", &self.rule_count())
            .field("has_default_handler", &self.has_default_handler())
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;

    fn reply(text: &'static str) -> impl Handler {
        move |mut conn: Connection, _req: Request| async move {
            conn.write(text.as_bytes()).await.unwrap();
            conn.close().await.unwrap();
        }
    }

    fn test_mux() -> ServeMux {
        let mux = ServeMux::new();
        mux.handle_func("^testing", reply("testing handler")).unwrap();
        mux.handle_func(
            "^add (?P<username>c[a-z0-9]{8}) (?P<group>w[a-z0-9]{10})$",
            |mut conn: Connection, req: Request| async move {
                let out = format!(
                    "group {} {}",
                    req.get("username").unwrap_or_default(),
                    req.get("group").unwrap_or_default()
                );
                conn.write(out.as_bytes()).await.unwrap();
                conn.close().await.unwrap();
            },
        )
        .unwrap();
        mux.handle_default_func(reply("not found"));
        mux
    }

    async fn roundtrip(mux: &ServeMux, line: &str) -> (DispatchOutcome, String) {
        let (mut client, server) = UnixStream::pair().unwrap();
        client.write_all(line.as_bytes()).await.unwrap();

        let outcome = mux.serve_connection(server, &Shutdown::new()).await;

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        (outcome, out)
    }

    #[tokio::test]
    async fn dispatches_to_matching_handlers() {
        let mux = test_mux();
        let cases = [
            ("notfound", DispatchOutcome::Default, "not found"),
            ("testing", DispatchOutcome::Matched, "testing handler"),
            (
                "add cabcdefgh w0123456789",
                DispatchOutcome::Matched,
                "group cabcdefgh w0123456789",
            ),
        ];

        for (input, outcome, expected) in cases {
            assert_eq!(
                roundtrip(&mux, input).await,
                (outcome, expected.to_string()),
                "input {input:?}"
            );
        }
    }

    #[tokio::test]
    async fn trailing_newline_is_not_part_of_the_line() {
        let mux = test_mux();
        let (outcome, out) = roundtrip(&mux, "add cabcdefgh w0123456789\n").await;
        assert_eq!(outcome, DispatchOutcome::Matched);
        assert_eq!(out, "group cabcdefgh w0123456789");
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let mux = ServeMux::new();
        mux.handle_func("^ping", reply("first")).unwrap();
        mux.handle_func("ping$", reply("second")).unwrap();

        for _ in 0..5 {
            assert_eq!(roundtrip(&mux, "ping").await.1, "first");
        }
    }

    #[tokio::test]
    async fn duplicate_patterns_are_independent_rules() {
        let mux = ServeMux::new();
        mux.handle_func("^ping$", reply("first")).unwrap();
        mux.handle_func("^ping$", reply("second")).unwrap();

        assert_eq!(mux.rule_count(), 2);
        assert_eq!(roundtrip(&mux, "ping").await.1, "first");
    }

    #[tokio::test]
    async fn request_exposes_named_groups_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mux = ServeMux::new();
        mux.handle_func(
            r"^(set) (?P<key>\w+)=(?P<value>\w+)$",
            move |mut conn: Connection, req: Request| {
                let tx = tx.clone();
                async move {
                    tx.send(req).unwrap();
                    conn.close().await.unwrap();
                }
            },
        )
        .unwrap();

        roundtrip(&mux, "set color=blue").await;
        let req = rx.recv().await.unwrap();

        assert_eq!(req.raw_line(), "set color=blue");
        assert_eq!(req.vars().len(), 2);
        assert_eq!(req.get("key"), Some("color"));
        assert_eq!(req.get("value"), Some("blue"));
    }

    #[tokio::test]
    async fn default_handler_sees_raw_line_and_no_vars() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mux = ServeMux::new();
        mux.handle_func("^(?P<cmd>status)$", reply("ok")).unwrap();
        mux.handle_default_func(move |mut conn: Connection, req: Request| {
            let tx = tx.clone();
            async move {
                tx.send(req).unwrap();
                conn.close().await.unwrap();
            }
        });

        let (outcome, out) = roundtrip(&mux, "notfound").await;
        assert_eq!(outcome, DispatchOutcome::Default);
        assert_eq!(out, "");

        let req = rx.recv().await.unwrap();
        assert_eq!(req.raw_line(), "notfound");
        assert!(req.vars().is_empty());
    }

    #[tokio::test]
    async fn unmatched_without_default_writes_nothing() {
        let mux = ServeMux::new();
        mux.handle_func("^testing", reply("testing handler")).unwrap();

        assert_eq!(
            roundtrip(&mux, "something else").await,
            (DispatchOutcome::Dropped, String::new())
        );
    }

    #[tokio::test]
    async fn shutdown_before_dispatch_drops_connection() {
        let mux = test_mux();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let (mut client, server) = UnixStream::pair().unwrap();
        let outcome = mux.serve_connection(server, &shutdown).await;
        assert_eq!(outcome, DispatchOutcome::Dropped);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn peer_hanging_up_is_dropped_silently() {
        let mux = test_mux();
        let (client, server) = UnixStream::pair().unwrap();
        drop(client);

        assert_eq!(
            mux.serve_connection(server, &Shutdown::new()).await,
            DispatchOutcome::Dropped
        );
    }

    #[tokio::test]
    async fn buffer_size_is_configurable() {
        let mux = ServeMux::new().with_buffer_size(7);
        mux.handle_func("^testing$", reply("exact")).unwrap();
        mux.handle_default_func(reply("partial"));

        assert_eq!(mux.buffer_size(), 7);
        assert_eq!(roundtrip(&mux, "testing").await.1, "exact");
        assert_eq!(ServeMux::new().with_buffer_size(0).buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn invalid_pattern_registers_nothing() {
        let mux = ServeMux::new();
        let err = mux.handle_func("(?P<open", reply("never")).unwrap_err();

        let RouterError::Compile { pattern, .. } = err;
        assert_eq!(pattern, "(?P<open");
        assert_eq!(mux.rule_count(), 0);
    }

    #[tokio::test]
    async fn from_config_serves_reply_routes() {
        let config: MuxConfig = toml::from_str(
            r#"
            default_reply = "not found"

            [listener]
            buffer_size = 64

            [[routes]]
            name = "add"
            pattern = '^add (?P<username>c[a-z0-9]{8}) (?P<group>w[a-z0-9]{10})$'
            reply = "group $username $group"
            "#,
        )
        .unwrap();

        let mux = ServeMux::from_config(&config).unwrap();
        assert_eq!(mux.rule_count(), 1);
        assert_eq!(mux.buffer_size(), 64);
        assert_eq!(
            roundtrip(&mux, "add cabcdefgh w0123456789").await.1,
            "group cabcdefgh w0123456789"
        );
        assert_eq!(roundtrip(&mux, "remove x").await.1, "not found");
    }

    #[test]
    fn from_config_rejects_bad_patterns() {
        let mut config = MuxConfig::default();
        config.routes.push(crate::config::RouteConfig {
            name: "broken".to_string(),
            pattern: "(".to_string(),
            reply: String::new(),
        });
        assert!(matches!(
            ServeMux::from_config(&config),
            Err(RouterError::Compile { .. })
        ));
    }

    #[test]
    fn default_handler_is_replaced() {
        let mux = ServeMux::new();
        assert!(!mux.has_default_handler());

        mux.handle_default_func(reply("one"));
        mux.handle_default_func(reply("two"));
        assert!(mux.has_default_handler());
    }
}
