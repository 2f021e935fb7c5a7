//! Command lifecycle events and their listeners.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{ErrorKind, SqlMiddlewareDbError};
use crate::types::RowValues;

/// Per-call context shared by every event of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    /// Fresh for every execution; ties its events together
    pub command_id: Uuid,
    /// Wall-clock time the native call started
    pub start_time: DateTime<Utc>,
    pub command_text: String,
    /// Rendered parameters; values appear only when parameter logging is on
    pub parameters: String,
    pub connection_id: Uuid,
    pub timeout: Option<Duration>,
    pub transaction_id: Option<Uuid>,
}

/// Which native call an execution makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    NonQuery,
    Scalar,
    Reader,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::NonQuery => f.write_str("non_query"),
            ExecutionMode::Scalar => f.write_str("scalar"),
            ExecutionMode::Reader => f.write_str("reader"),
        }
    }
}

/// What a successful execution produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    RowsAffected(i64),
    Scalar(RowValues),
    /// A reader was handed to the caller
    Reader,
}

/// A failed execution's error, kept structured for listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandErrorInfo {
    pub kind: ErrorKind,
    pub native_code: Option<i32>,
    pub message: String,
}

impl From<&SqlMiddlewareDbError> for CommandErrorInfo {
    fn from(error: &SqlMiddlewareDbError) -> Self {
        Self {
            kind: error.kind(),
            native_code: error.native_code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandEvent {
    CommandExecuting {
        context: CommandContext,
        mode: ExecutionMode,
        is_async: bool,
    },
    CommandExecuted {
        context: CommandContext,
        mode: ExecutionMode,
        result: CommandResult,
        elapsed: Duration,
        is_async: bool,
    },
    CommandError {
        context: CommandContext,
        mode: ExecutionMode,
        error: CommandErrorInfo,
        elapsed: Duration,
        is_async: bool,
    },
    /// A reader is releasing its command and, if it owns it, the connection.
    DataReaderDisposing {
        command_id: Uuid,
        connection_id: Uuid,
        command_text: String,
        records_affected: i64,
        elapsed: Duration,
    },
}

impl CommandEvent {
    /// Short name of the event, as it appears in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CommandEvent::CommandExecuting { .. } => "command_executing",
            CommandEvent::CommandExecuted { .. } => "command_executed",
            CommandEvent::CommandError { .. } => "command_error",
            CommandEvent::DataReaderDisposing { .. } => "data_reader_disposing",
        }
    }

    /// Id of the execution this event belongs to.
    #[must_use]
    pub fn command_id(&self) -> Uuid {
        match self {
            CommandEvent::CommandExecuting { context, .. }
            | CommandEvent::CommandExecuted { context, .. }
            | CommandEvent::CommandError { context, .. } => context.command_id,
            CommandEvent::DataReaderDisposing { command_id, .. } => *command_id,
        }
    }
}

/// Receives command events in the order they happen.
pub trait DiagnosticsListener: Send + Sync {
    fn on_event(&self, event: &CommandEvent);
}

/// Forwards events to `tracing`; the default listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsListener for TracingDiagnostics {
    fn on_event(&self, event: &CommandEvent) {
        match event {
            CommandEvent::CommandExecuting {
                context,
                mode,
                is_async,
            } => debug!(
                command_id = %context.command_id,
                connection_id = %context.connection_id,
                %mode,
                is_async,
                parameters = %context.parameters,
                "executing: {}",
                context.command_text
            ),
            CommandEvent::CommandExecuted {
                context,
                mode,
                result,
                elapsed,
                is_async,
            } => debug!(
                command_id = %context.command_id,
                connection_id = %context.connection_id,
                %mode,
                is_async,
                ?result,
                ?elapsed,
                "executed: {}",
                context.command_text
            ),
            CommandEvent::CommandError {
                context,
                mode,
                error,
                elapsed,
                is_async,
            } => error!(
                command_id = %context.command_id,
                connection_id = %context.connection_id,
                %mode,
                is_async,
                kind = ?error.kind,
                native_code = ?error.native_code,
                ?elapsed,
                parameters = %context.parameters,
                "command failed: {} -- {}",
                error.message,
                context.command_text
            ),
            CommandEvent::DataReaderDisposing {
                command_id,
                connection_id,
                records_affected,
                elapsed,
                ..
            } => debug!(
                %command_id,
                %connection_id,
                records_affected,
                ?elapsed,
                "data reader disposing"
            ),
        }
    }
}
