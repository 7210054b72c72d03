//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer size > 0, non-empty socket path)
//! - Check that every route pattern compiles and names are unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: MuxConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use regex::Regex;
use tracing_subscriber::EnvFilter;

use crate::config::schema::MuxConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.socket_path must not be empty")]
    EmptySocketPath,
    #[error("listener.buffer_size must be greater than zero")]
    ZeroBufferSize,
    #[error("route #{index} has an empty name")]
    EmptyRouteName { index: usize },
    #[error("route name {name:?} is used more than once")]
    DuplicateRouteName { name: String },
    #[error("route {name:?} has an invalid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },
    #[error("observability.log_level {level:?} is not a valid filter: {reason}")]
    InvalidLogLevel { level: String, reason: String },
    #[error("observability.metrics_address {address:?} is not a socket address")]
    InvalidMetricsAddress { address: String },
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &MuxConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_path.trim().is_empty() {
        errors.push(ValidationError::EmptySocketPath);
    }
    if config.listener.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }

    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        } else if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName {
                name: route.name.clone(),
            });
        }

        if let Err(e) = Regex::new(&route.pattern) {
            errors.push(ValidationError::InvalidPattern {
                name: route.name.clone(),
                reason: e.to_string(),
            });
        }
    }

    let observability = &config.observability;
    if let Err(e) = EnvFilter::try_new(&observability.log_level) {
        errors.push(ValidationError::InvalidLogLevel {
            level: observability.log_level.clone(),
            reason: e.to_string(),
        });
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress {
            address: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
