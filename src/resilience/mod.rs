//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend selection:
//!     → circuit_breaker.rs (is this backend allowed traffic right now?)
//! Request outcome:
//!     → circuit_breaker.rs (count failures, open circuit if threshold reached)
//!     → clock.rs (stamp failure time, measure cooldown)
//! ```
//!
//! # Design Decisions
//! - No internal retries; a failed forward is surfaced as 502
//! - Time is injected so cooldowns are testable without sleeping

pub mod circuit_breaker;
pub mod clock;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
