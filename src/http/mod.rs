//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign / resolve request ID)
//!     → guard (deadline per non-exempt request)
//!     → handlers.rs (probes, metrics, forwarding)
//!     → upstream.rs (NDC upstream exchange)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;
pub mod upstream;

pub use request::{correlation_id, MakeCorrelationId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer, GatewayServerBuilder};
pub use upstream::Upstream;
