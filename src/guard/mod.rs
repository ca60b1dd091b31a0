//! Request guard subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → layer.rs (exempt path? pass straight through)
//!     → deadline.rs (arm one-shot timer for this unit of work)
//!     → handler dispatched on its own task, raced against the deadline
//!
//! Handler finishes first:
//!     → empty body: Deadline::complete() (timer aborted) → response returned
//!     → streamed body: body.rs takes the deadline, completes it on the last
//!       frame, error or drop
//!
//! Deadline fires before the headers:
//!     → report.rs (one TimeoutRecord to the reporter)
//!     → ApiError::Timeout → 504 response
//!     → late handler response discarded
//!
//! Deadline fires mid-body:
//!     → report.rs (one TimeoutRecord) → body yields an error, stream cut
//! ```
//!
//! # Design Decisions
//! - One timer per unit of work, owned by the request future
//! - Completion and firing race on a single atomic transition
//! - The handler is never preempted; only its result is dropped on timeout
//! - Exempt paths never arm a timer (probes must answer unconditionally)

pub mod body;
pub mod config;
pub mod deadline;
pub mod layer;
pub mod report;

pub use body::GuardedBody;
pub use config::{GuardConfig, GuardConfigError};
pub use deadline::{Deadline, DeadlineState};
pub use layer::{RequestGuard, RequestGuardLayer};
pub use report::{LogReporter, TimeoutRecord, TimeoutReporter};
