//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through request spans and upstream headers
//! - Metrics exporter is opt-in

pub mod logging;
pub mod metrics;
