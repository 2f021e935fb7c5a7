use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;

/// Diagnostic context attached to a failed command.
#[derive(Debug)]
pub struct CommandFailure {
    /// Statement text as sent to the driver (after adjustment)
    pub command_text: String,
    /// Rendered parameters, `name=value` or `name=?` when values are not logged
    pub parameters: String,
    /// Time spent between the executing event and the failure
    pub elapsed: Duration,
    /// The driver error, unchanged
    pub source: DriverError,
}

/// Variant of a [`SqlMiddlewareDbError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DisallowedType,
    AmbiguousType,
    InvalidStoreType,
    NoMapping,
    MissingParameterValue,
    LiteralError,
    CommandFailed,
    Driver,
    TransientResourceBusy,
    TeardownTimedOut,
    Cancelled,
    ConfigError,
    ParameterError,
    ExecutionError,
    Other,
}

#[derive(Debug, Error)]
pub enum SqlMiddlewareDbError {
    #[error("Store type '{store_type}' must declare a length, precision or scale")]
    DisallowedType { store_type: String },

    #[error("Store type '{store_type}' maps to several logical kinds; specify the kind")]
    AmbiguousType { store_type: String },

    #[error("Store type '{store_type}' is invalid: {reason}")]
    InvalidStoreType { store_type: String, reason: String },

    #[error("No type mapping found: {0}")]
    NoMapping(String),

    #[error("No value supplied for parameter '{name}'")]
    MissingParameterValue { name: String },

    #[error("Literal generation error: {0}")]
    LiteralError(String),

    #[error(
        "Command failed after {:?}: {} [{}] -- {}",
        .0.elapsed, .0.source, .0.parameters, .0.command_text
    )]
    CommandFailed(#[source] Box<CommandFailure>),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Resource busy (ORA-{code:05}): {message}")]
    TransientResourceBusy { code: i32, message: String },

    #[error("Teardown of '{resource}' gave up after {attempts} attempts in {elapsed:?}: {last_error}")]
    TeardownTimedOut {
        resource: String,
        attempts: u32,
        elapsed: Duration,
        last_error: Box<SqlMiddlewareDbError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlMiddlewareDbError {
    /// Engine error code carried by this error, looking through command wrappers.
    #[must_use]
    pub fn native_code(&self) -> Option<i32> {
        match self {
            SqlMiddlewareDbError::Driver(err) => err.code,
            SqlMiddlewareDbError::CommandFailed(failure) => failure.source.code,
            SqlMiddlewareDbError::TransientResourceBusy { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlMiddlewareDbError::DisallowedType { .. } => ErrorKind::DisallowedType,
            SqlMiddlewareDbError::AmbiguousType { .. } => ErrorKind::AmbiguousType,
            SqlMiddlewareDbError::InvalidStoreType { .. } => ErrorKind::InvalidStoreType,
            SqlMiddlewareDbError::NoMapping(_) => ErrorKind::NoMapping,
            SqlMiddlewareDbError::MissingParameterValue { .. } => ErrorKind::MissingParameterValue,
            SqlMiddlewareDbError::LiteralError(_) => ErrorKind::LiteralError,
            SqlMiddlewareDbError::CommandFailed(_) => ErrorKind::CommandFailed,
            SqlMiddlewareDbError::Driver(_) => ErrorKind::Driver,
            SqlMiddlewareDbError::TransientResourceBusy { .. } => ErrorKind::TransientResourceBusy,
            SqlMiddlewareDbError::TeardownTimedOut { .. } => ErrorKind::TeardownTimedOut,
            SqlMiddlewareDbError::Cancelled => ErrorKind::Cancelled,
            SqlMiddlewareDbError::ConfigError(_) => ErrorKind::ConfigError,
            SqlMiddlewareDbError::ParameterError(_) => ErrorKind::ParameterError,
            SqlMiddlewareDbError::ExecutionError(_) => ErrorKind::ExecutionError,
            SqlMiddlewareDbError::Other(_) => ErrorKind::Other,
        }
    }

    /// The underlying driver error, if this error came from the driver.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlMiddlewareDbError::Driver(err) => Some(err),
            SqlMiddlewareDbError::CommandFailed(failure) => Some(&failure.source),
            _ => None,
        }
    }

    /// Resolution and binding failures point at a caller defect and are never retried.
    #[must_use]
    pub fn is_caller_defect(&self) -> bool {
        matches!(
            self,
            SqlMiddlewareDbError::DisallowedType { .. }
                | SqlMiddlewareDbError::AmbiguousType { .. }
                | SqlMiddlewareDbError::InvalidStoreType { .. }
                | SqlMiddlewareDbError::NoMapping(_)
                | SqlMiddlewareDbError::MissingParameterValue { .. }
        )
    }
}

impl std::error::Error for CommandFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.source, self.command_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_code_looks_through_command_failure() {
        let err = SqlMiddlewareDbError::CommandFailed(Box::new(CommandFailure {
            command_text: "DROP USER \"A\" CASCADE".into(),
            parameters: String::new(),
            elapsed: Duration::from_millis(3),
            source: DriverError::with_code(1940, "cannot drop a user that is currently connected"),
        }));
        assert_eq!(err.native_code(), Some(1940));
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert!(!err.is_caller_defect());
    }

    #[test]
    fn resolution_errors_are_caller_defects() {
        let err = SqlMiddlewareDbError::DisallowedType {
            store_type: "VARCHAR2".into(),
        };
        assert!(err.is_caller_defect());
        assert_eq!(err.native_code(), None);
    }
}
