//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → load_balancer (select backend for /v1/proxy/{service})
//!     → request.rs (strip prefix, build upstream URI and headers)
//!     → hyper client
//!     → response.rs (stream backend response back)
//!     → error.rs (selection/transport failures as JSON errors)
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::GatewayError;
pub use server::{AppState, GatewayServer};
