//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → GuardConfig built once at startup, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the process lifetime; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GatewayConfig, GuardSettings, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
