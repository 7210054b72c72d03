//! Reply templates for routes declared in configuration.
//!
//! Templates use the `regex` replacement syntax: `$name` or `${name}` expands
//! to the named capture, `$$` is a literal dollar sign, and unknown names
//! expand to nothing.

use std::sync::Arc;

use regex::Regex;

use crate::net::Connection;
use crate::routing::handler::Handler;
use crate::routing::request::Request;

/// A fixed reply, optionally filled in from the route's captures.
#[derive(Debug, Clone)]
pub struct ReplyTemplate {
    pattern: Option<Regex>,
    template: String,
}

impl ReplyTemplate {
    /// A template expanded against the captures of `pattern`.
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Some(Regex::new(pattern)?),
            template: template.into(),
        })
    }

    /// A reply sent verbatim, as used for the default route.
    pub fn literal(template: impl Into<String>) -> Self {
        Self {
            pattern: None,
            template: template.into(),
        }
    }

    /// Render the reply for `request`.
    pub fn render(&self, request: &Request) -> String {
        let caps = self
            .pattern
            .as_ref()
            .and_then(|pattern| pattern.captures(request.raw_line()));

        match caps {
            Some(caps) => {
                let mut out = String::with_capacity(self.template.len());
                caps.expand(&self.template, &mut out);
                out
            }
            None => self.template.clone(),
        }
    }

    /// A handler that writes the rendered reply and closes the connection.
    pub fn into_handler(self) -> impl Handler {
        let template = Arc::new(self);
        move |mut conn: Connection, req: Request| {
            let template = Arc::clone(&template);
            async move {
                let body = template.render(&req);
                if let Err(e) = conn.write(body.as_bytes()).await {
                    tracing::warn!(connection_id = %conn.id(), error = %e, "Failed to write reply");
                }
                if let Err(e) = conn.close().await {
                    tracing::debug!(connection_id = %conn.id(), error = %e, "Close failed");
                }
            }
        }
    }
}
