//! Selected backend handle.
//!
//! # Responsibilities
//! - Carry the chosen backend URL to the forwarding code
//! - Route the request outcome back to the breaker that approved it
//!
//! # Design Decisions
//! - Reporting consumes the handle, so an outcome is recorded at most once
//! - Dropping an unreported handle leaves the breaker untouched
//! - Holds only an `Arc`, no lock, while the request is in flight

use std::sync::Arc;

use url::Url;

use crate::resilience::circuit_breaker::CircuitBreaker;

/// A backend chosen for one request.
#[derive(Debug)]
#[must_use = "report the outcome with BackendSelector::report_success or report_failure"]
pub struct Selection {
    service: Arc<str>,
    index: usize,
    breaker: Arc<CircuitBreaker>,
}

impl Selection {
    pub(crate) fn new(service: Arc<str>, index: usize, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            service,
            index,
            breaker,
        }
    }

    /// Base URL of the selected backend.
    pub fn url(&self) -> &Url {
        self.breaker.url()
    }

    /// Service the backend was selected for.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Position of the backend in the service's registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn succeed(self) {
        self.breaker.record_success();
    }

    pub(crate) fn fail(self) {
        self.breaker.record_failure();
    }
}
