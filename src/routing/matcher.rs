//! Line pattern matching.
//!
//! # Design Decisions
//! - Patterns use the `regex` crate dialect, including `(?P<name>...)` groups
//! - Matching is "find anywhere"; callers anchor with `^`/`$` themselves
//! - Only named groups are exposed; positional groups are ignored

use std::collections::HashMap;

use regex::Regex;

/// A compiled routing pattern.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

impl LinePattern {
    /// Compile `pattern`.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns true if the pattern matches somewhere in `line`.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Match `line` and collect every named group.
    ///
    /// Returns `None` when the pattern does not match. A named group that did
    /// not take part in the match maps to an empty string.
    pub fn captures(&self, line: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(line)?;
        let vars = self
            .regex
            .capture_names()
            .flatten()
            .map(|name| {
                let text = caps.name(name).map_or("", |m| m.as_str());
                (name.to_string(), text.to_string())
            })
            .collect();
        Some(vars)
    }
}
