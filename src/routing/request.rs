//! The parsed command line handed to a handler.

use std::collections::HashMap;

/// One command line together with the named groups its route captured.
///
/// Built fresh for every dispatched connection and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    raw_line: String,
    vars: HashMap<String, String>,
}

impl Request {
    /// A request with no captured variables, as seen by the default handler.
    pub fn new(raw_line: impl Into<String>) -> Self {
        Self {
            raw_line: raw_line.into(),
            vars: HashMap::new(),
        }
    }

    /// A request carrying the named groups of a matched pattern.
    pub fn with_vars(raw_line: impl Into<String>, vars: HashMap<String, String>) -> Self {
        Self {
            raw_line: raw_line.into(),
            vars,
        }
    }

    /// Text captured by the named group `key`, if the pattern has one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The full line as read from the socket, trailing newline removed.
    ///
    /// Mostly useful for logging in a default handler.
    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }

    /// All named captures.
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }
}
