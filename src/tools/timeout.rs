//! Execution Timeouts
//!
//! A per-call timeout wins over the service-wide default; expiry surfaces as
//! `CommandError::Timeout`.

use std::time::Duration;
use tokio::time;

use crate::error::CommandError;

/// Service-wide default timeout (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to one command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use shellgate::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Per-call override if given, else this timeout
    pub fn resolve(self, per_call: Option<Duration>) -> Self {
        per_call.map(Self::new).unwrap_or(self)
    }

    /// Execute a future with a timeout
    ///
    /// Dropping the future on expiry is what terminates the work, so the
    /// future must own whatever needs cleaning up (e.g. a `kill_on_drop`
    /// child process).
    pub async fn run<F, T>(&self, command: &str, future: F) -> Result<T, CommandError>
    where
        F: std::future::Future<Output = Result<T, CommandError>>,
    {
        match time::timeout(self.duration, future).await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Timeout {
                command: command.to_string(),
                timeout: self.duration,
            }),
        }
    }
}
