//! Request gateway library.
//!
//! Routes `/v1/proxy/{service}/...` to one of the service's backends,
//! chosen round-robin among those whose circuit breaker admits traffic.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{BackendSelector, SelectError, Selection};
