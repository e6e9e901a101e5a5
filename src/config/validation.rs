//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every service has at least one well-formed, distinct backend URL
//! - Validate value ranges (threshold >= 1, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service '{0}' has no backends")]
    EmptyService(String),

    #[error("service '{service}' backend '{address}' is not a valid URL: {reason}")]
    InvalidBackendUrl {
        service: String,
        address: String,
        reason: String,
    },

    #[error("service '{service}' backend '{address}' must use http")]
    UnsupportedScheme { service: String, address: String },

    #[error("service '{service}' backend '{address}' has no host")]
    MissingHost { service: String, address: String },

    #[error("service '{service}' backend '{address}' must not carry a query or fragment")]
    UnexpectedQuery { service: String, address: String },

    #[error("service '{service}' lists backend '{address}' more than once")]
    DuplicateBackend { service: String, address: String },

    #[error("circuit_breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (service, addresses) in &config.services {
        if addresses.is_empty() {
            errors.push(ValidationError::EmptyService(service.clone()));
        }

        let mut seen = HashSet::new();
        for address in addresses {
            match Url::parse(address) {
                Ok(url) if url.scheme() != "http" => {
                    errors.push(ValidationError::UnsupportedScheme {
                        service: service.clone(),
                        address: address.clone(),
                    });
                }
                Ok(url) if url.host_str().map_or(true, str::is_empty) => {
                    errors.push(ValidationError::MissingHost {
                        service: service.clone(),
                        address: address.clone(),
                    });
                }
                // Paths are appended to the base URL verbatim.
                Ok(url) if url.query().is_some() || url.fragment().is_some() => {
                    errors.push(ValidationError::UnexpectedQuery {
                        service: service.clone(),
                        address: address.clone(),
                    });
                }
                Ok(url) => {
                    if !seen.insert(url) {
                        errors.push(ValidationError::DuplicateBackend {
                            service: service.clone(),
                            address: address.clone(),
                        });
                    }
                }
                Err(e) => errors.push(ValidationError::InvalidBackendUrl {
                    service: service.clone(),
                    address: address.clone(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.circuit_breaker.cooldown_secs == 0 {
        errors.push(ValidationError::ZeroDuration("circuit_breaker.cooldown_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
