//! NDC booking gateway.
//!
//! An axum service that forwards agent traffic to an NDC upstream, with every
//! non-probe request bounded by a per-request deadline (see [`guard`]).

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::{ApiError, TimeoutExceeded};
pub use guard::{GuardConfig, RequestGuardLayer};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
