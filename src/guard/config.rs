//! Runtime configuration for the request guard.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::GuardSettings;

/// Errors raised while building a [`GuardConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardConfigError {
    /// A zero deadline would time out every request immediately.
    #[error("guard timeout must be greater than zero")]
    ZeroTimeout,
}

/// Validated, immutable guard configuration.
///
/// Built once at startup and shared behind an `Arc` by every request.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    timeout: Duration,
    exempt_paths: HashSet<String>,
}

impl GuardConfig {
    /// Create a guard configuration.
    ///
    /// Exempt paths are matched exactly against the request path.
    pub fn new<I, P>(timeout: Duration, exempt_paths: I) -> Result<Self, GuardConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        if timeout.is_zero() {
            return Err(GuardConfigError::ZeroTimeout);
        }

        Ok(Self {
            timeout,
            exempt_paths: exempt_paths.into_iter().map(Into::into).collect(),
        })
    }

    /// Deadline applied to every non-exempt request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true if requests to `path` bypass the guard entirely.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.contains(path)
    }

    /// Iterate over the configured exempt paths (unordered).
    pub fn exempt_paths(&self) -> impl Iterator<Item = &str> {
        self.exempt_paths.iter().map(String::as_str)
    }
}

impl TryFrom<&GuardSettings> for GuardConfig {
    type Error = GuardConfigError;

    fn try_from(settings: &GuardSettings) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_millis(settings.timeout_ms),
            settings.exempt_paths.iter().cloned(),
        )
    }
}
