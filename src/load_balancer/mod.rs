//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request for service S
//!     → pool.rs (look up S's backends)
//!     → round_robin.rs (scan from cursor, ask each breaker if it accepts traffic)
//!     → backend.rs (Selection handle: backend URL + breaker)
//!     → forward request (http layer)
//!     → pool.rs report_success / report_failure → breaker
//! ```
//!
//! # Design Decisions
//! - One cursor per service, advanced past the selected backend
//! - Backends with a refusing breaker are skipped, never queued
//! - Selection fails fast; retries are the caller's concern

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Selection;
pub use pool::{BackendSelector, ServiceSnapshot};

use thiserror::Error;

/// Errors returned by `BackendSelector::select`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// No backends are registered under this service name.
    #[error("Service {0} not found")]
    ServiceNotFound(String),

    /// Every backend of the service is open or mid-probe.
    #[error("No available backends for {0}")]
    NoAvailableBackend(String),
}
