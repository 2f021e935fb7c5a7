use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlMiddlewareDbError;

/// Default cap on teardown attempts.
pub const DEFAULT_TEARDOWN_ATTEMPTS: u32 = 30;
/// Default wall-clock budget for a teardown.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(60);
/// Default pause between teardown attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Options for the command executor.
///
/// ```rust
/// use sql_middleware_oracle::prelude::*;
///
/// let opts = ExecutorOptions::from_json_str(r#"{ "command_timeout_ms": 1500 }"#).unwrap();
/// assert_eq!(opts.command_timeout, Some(std::time::Duration::from_millis(1500)));
/// assert!(!opts.log_parameter_values);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Passed to the driver with every command
    #[serde(rename = "command_timeout_ms", with = "optional_millis")]
    pub command_timeout: Option<Duration>,
    /// Include parameter values in diagnostics and errors
    pub log_parameter_values: bool,
}

impl ExecutorOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_parameter_values_logged(mut self, log_parameter_values: bool) -> Self {
        self.log_parameter_values = log_parameter_values;
        self
    }

    /// Read options from JSON; durations are in milliseconds.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` when the JSON does not match.
    pub fn from_json_str(json: &str) -> Result<Self, SqlMiddlewareDbError> {
        serde_json::from_str(json)
            .map_err(|e| SqlMiddlewareDbError::ConfigError(format!("executor options: {e}")))
    }
}

/// Fluent builder for executor options.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptionsBuilder {
    opts: ExecutorOptions,
}

impl ExecutorOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.opts.command_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn log_parameter_values(mut self, log_parameter_values: bool) -> Self {
        self.opts.log_parameter_values = log_parameter_values;
        self
    }

    #[must_use]
    pub fn finish(self) -> ExecutorOptions {
        self.opts
    }
}

/// Bounds on the teardown retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TeardownOptions {
    pub max_attempts: u32,
    #[serde(rename = "total_timeout_ms", with = "millis")]
    pub total_timeout: Duration,
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TEARDOWN_ATTEMPTS,
            total_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl TeardownOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Read options from JSON; durations are in milliseconds.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` when the JSON does not match
    /// or `max_attempts` is zero.
    pub fn from_json_str(json: &str) -> Result<Self, SqlMiddlewareDbError> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| SqlMiddlewareDbError::ConfigError(format!("teardown options: {e}")))?;
        opts.validated()
    }

    fn validated(self) -> Result<Self, SqlMiddlewareDbError> {
        if self.max_attempts == 0 {
            return Err(SqlMiddlewareDbError::ConfigError(
                "teardown options: max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Fluent builder for teardown options.
#[derive(Debug, Clone, Default)]
pub struct TeardownOptionsBuilder {
    opts: TeardownOptions,
}

impl TeardownOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.opts.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn total_timeout(mut self, total_timeout: Duration) -> Self {
        self.opts.total_timeout = total_timeout;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.opts.retry_delay = retry_delay;
        self
    }

    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` when `max_attempts` is zero.
    pub fn finish(self) -> Result<TeardownOptions, SqlMiddlewareDbError> {
        self.opts.validated()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_defaults() {
        let opts = TeardownOptions::default();
        assert_eq!(opts.max_attempts, 30);
        assert_eq!(opts.total_timeout, Duration::from_secs(60));
        assert_eq!(opts.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn teardown_from_json_fills_missing_fields() {
        let opts = TeardownOptions::from_json_str(r#"{ "retry_delay_ms": 10 }"#).unwrap();
        assert_eq!(opts.retry_delay, Duration::from_millis(10));
        assert_eq!(opts.max_attempts, DEFAULT_TEARDOWN_ATTEMPTS);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = TeardownOptions::from_json_str(r#"{ "max_attempts": 0 }"#).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)));
    }

    #[test]
    fn teardown_builder_rejects_zero_attempts() {
        let err = TeardownOptionsBuilder::new().max_attempts(0).finish().unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)));

        let opts = TeardownOptionsBuilder::new()
            .max_attempts(2)
            .retry_delay(Duration::from_millis(5))
            .finish()
            .unwrap();
        let set = TeardownOptions::new()
            .with_max_attempts(2)
            .with_retry_delay(Duration::from_millis(5));
        assert_eq!(opts, set);
    }

    #[test]
    fn builders_match_setters() {
        let built = ExecutorOptionsBuilder::new()
            .command_timeout(Duration::from_secs(5))
            .log_parameter_values(true)
            .finish();
        let set = ExecutorOptions::new()
            .with_command_timeout(Some(Duration::from_secs(5)))
            .with_parameter_values_logged(true);
        assert_eq!(built, set);
    }
}
