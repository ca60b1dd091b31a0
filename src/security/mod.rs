//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api request:
//!     → rate_limit.rs (check per-client limits)
//!     → Pass to upstream forwarding
//!
//! Cross-origin requests:
//!     → cors.rs (preflight answered from the configured origin list)
//!
//! Every response:
//!     → headers.rs (nosniff, frame denial, referrer policy)
//! ```
//!
//! # Design Decisions
//! - Probes are never rate limited
//! - No CORS headers at all unless origins are configured

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::cors_layer;
pub use headers::apply_security_headers;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
