use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use super::shape::{CallShape, native_call};
use super::{ExecutionState, RelationalCommand, adjust_command_text};
use crate::config::ExecutorOptions;
use crate::diagnostics::{
    CommandContext, CommandErrorInfo, CommandEvent, CommandResult, DiagnosticsListener,
    ExecutionMode, TracingDiagnostics,
};
use crate::driver::{CommandSpec, DbCommand, DbConnection, NativeValue};
use crate::error::{CommandFailure, SqlMiddlewareDbError};
use crate::mapping::codec::untyped_from_native;
use crate::params::{ParameterValues, bind_parameters, render_parameters};
use crate::reader::RelationalDataReader;
use crate::types::RowValues;

/// Runs relational commands against a native connection.
///
/// Every mode has a blocking and an async entry point; both drive the same
/// core, which binds parameters, opens the connection if needed, raises
/// diagnostics and releases native resources on every exit path.
///
/// ```rust,no_run
/// use sql_middleware_oracle::prelude::*;
/// # fn demo<C: DbConnection>(conn: &mut C) -> Result<(), SqlMiddlewareDbError> {
/// let catalog = TypeMappingCatalog::oracle();
/// let command = RelationalCommand::new("UPDATE T SET NAME = :name WHERE ID = :id")
///     .parameter("name", catalog.find_by_kind(LogicalKind::String)?)
///     .parameter("id", catalog.find_by_kind(LogicalKind::Integer(IntWidth::W32))?);
/// let values = ParameterValues::new()
///     .with("name", RowValues::Text("alice".into()))
///     .with("id", RowValues::Int(7));
///
/// let changed = CommandExecutor::default().execute_non_query(conn, &command, &values)?;
/// # let _ = changed;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CommandExecutor {
    options: ExecutorOptions,
    diagnostics: Arc<dyn DiagnosticsListener>,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

enum Executed<'c, C: DbConnection> {
    Rows(i64),
    Scalar(RowValues),
    Reader(RelationalDataReader<'c, C>),
}

impl<'c, C: DbConnection> Executed<'c, C> {
    fn into_rows(self) -> Result<i64, SqlMiddlewareDbError> {
        match self {
            Executed::Rows(rows) => Ok(rows),
            _ => Err(unexpected_outcome(ExecutionMode::NonQuery)),
        }
    }

    fn into_scalar(self) -> Result<RowValues, SqlMiddlewareDbError> {
        match self {
            Executed::Scalar(value) => Ok(value),
            _ => Err(unexpected_outcome(ExecutionMode::Scalar)),
        }
    }

    fn into_reader(self) -> Result<RelationalDataReader<'c, C>, SqlMiddlewareDbError> {
        match self {
            Executed::Reader(reader) => Ok(reader),
            _ => Err(unexpected_outcome(ExecutionMode::Reader)),
        }
    }
}

fn unexpected_outcome(mode: ExecutionMode) -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::ExecutionError(format!("{mode} execution produced another outcome"))
}

enum NativeOutcome<R> {
    Rows(i64),
    Scalar(RowValues),
    Cursor(R),
}

impl<R> NativeOutcome<R> {
    fn result(&self) -> CommandResult {
        match self {
            NativeOutcome::Rows(rows) => CommandResult::RowsAffected(*rows),
            NativeOutcome::Scalar(value) => CommandResult::Scalar(value.clone()),
            NativeOutcome::Cursor(_) => CommandResult::Reader,
        }
    }
}

/// Closes the connection on drop when the executor opened it.
struct ConnectionScope<'c, C: DbConnection> {
    connection: Option<&'c mut C>,
    close_on_drop: bool,
}

impl<'c, C: DbConnection> ConnectionScope<'c, C> {
    fn connection(&mut self) -> Result<&mut C, SqlMiddlewareDbError> {
        self.connection.as_deref_mut().ok_or_else(handed_off)
    }

    /// Pass the connection, and the duty to close it, to a reader.
    fn hand_off(mut self) -> Result<(&'c mut C, bool), SqlMiddlewareDbError> {
        let close = std::mem::replace(&mut self.close_on_drop, false);
        let connection = self.connection.take().ok_or_else(handed_off)?;
        Ok((connection, close))
    }
}

impl<C: DbConnection> Drop for ConnectionScope<'_, C> {
    fn drop(&mut self) {
        if self.close_on_drop
            && let Some(connection) = self.connection.as_deref_mut()
            && let Err(e) = connection.close()
        {
            warn!(connection_id = %connection.connection_id(), "failed to close connection: {e}");
        }
    }
}

/// Clears parameters from the native command on drop; dropping the command disposes it.
struct CommandScope<Cmd: DbCommand> {
    command: Option<Cmd>,
}

impl<Cmd: DbCommand> CommandScope<Cmd> {
    fn command(&mut self) -> Result<&mut Cmd, SqlMiddlewareDbError> {
        self.command.as_mut().ok_or_else(handed_off)
    }

    /// Hand the command to a reader, which clears it on release.
    fn into_inner(mut self) -> Result<Cmd, SqlMiddlewareDbError> {
        self.command.take().ok_or_else(handed_off)
    }
}

impl<Cmd: DbCommand> Drop for CommandScope<Cmd> {
    fn drop(&mut self) {
        if let Some(mut command) = self.command.take() {
            command.clear_parameters();
        }
    }
}

fn handed_off() -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::ExecutionError("native handle already handed to a reader".to_string())
}

impl CommandExecutor {
    #[must_use]
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replace the default `tracing` listener.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsListener>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Execute a statement and return the number of rows it changed.
    ///
    /// # Errors
    /// Returns binding errors before any native call, and `CommandFailed` for driver failures.
    pub fn execute_non_query<C: DbConnection>(
        &self,
        connection: &mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
    ) -> Result<i64, SqlMiddlewareDbError> {
        self.run_blocking(connection, command, values, ExecutionMode::NonQuery)?
            .into_rows()
    }

    /// Async form of [`CommandExecutor::execute_non_query`].
    ///
    /// # Errors
    /// As the blocking form, plus `Cancelled` when `cancel` fires at a native call.
    pub async fn execute_non_query_async<C: DbConnection>(
        &self,
        connection: &mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
        cancel: &CancellationToken,
    ) -> Result<i64, SqlMiddlewareDbError> {
        self.execute(
            connection,
            command,
            values,
            ExecutionMode::NonQuery,
            CallShape::Async(cancel),
        )
        .await?
        .into_rows()
    }

    /// Execute a statement and return the first column of the first row.
    ///
    /// # Errors
    /// Returns binding errors before any native call, `CommandFailed` for driver
    /// failures and `ExecutionError` when the value cannot be decoded. A decode
    /// failure is reported to listeners as the command's error.
    pub fn execute_scalar<C: DbConnection>(
        &self,
        connection: &mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
    ) -> Result<RowValues, SqlMiddlewareDbError> {
        self.run_blocking(connection, command, values, ExecutionMode::Scalar)?
            .into_scalar()
    }

    /// Async form of [`CommandExecutor::execute_scalar`].
    ///
    /// # Errors
    /// As the blocking form, plus `Cancelled` when `cancel` fires at a native call.
    pub async fn execute_scalar_async<C: DbConnection>(
        &self,
        connection: &mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
        cancel: &CancellationToken,
    ) -> Result<RowValues, SqlMiddlewareDbError> {
        self.execute(
            connection,
            command,
            values,
            ExecutionMode::Scalar,
            CallShape::Async(cancel),
        )
        .await?
        .into_scalar()
    }

    /// Execute a query and return a reader over its rows.
    ///
    /// The reader keeps the command and, when this call opened the connection,
    /// closes it on release.
    ///
    /// # Errors
    /// Returns binding errors before any native call, and `CommandFailed` for driver failures.
    pub fn execute_reader<'c, C: DbConnection>(
        &self,
        connection: &'c mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
    ) -> Result<RelationalDataReader<'c, C>, SqlMiddlewareDbError> {
        self.run_blocking(connection, command, values, ExecutionMode::Reader)?
            .into_reader()
    }

    /// Async form of [`CommandExecutor::execute_reader`].
    ///
    /// # Errors
    /// As the blocking form, plus `Cancelled` when `cancel` fires at a native call.
    pub async fn execute_reader_async<'c, C: DbConnection>(
        &self,
        connection: &'c mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
        cancel: &CancellationToken,
    ) -> Result<RelationalDataReader<'c, C>, SqlMiddlewareDbError> {
        self.execute(
            connection,
            command,
            values,
            ExecutionMode::Reader,
            CallShape::Async(cancel),
        )
        .await?
        .into_reader()
    }

    fn run_blocking<'c, C: DbConnection>(
        &self,
        connection: &'c mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
        mode: ExecutionMode,
    ) -> Result<Executed<'c, C>, SqlMiddlewareDbError> {
        self.execute(connection, command, values, mode, CallShape::Blocking)
            .now_or_never()
            .unwrap_or_else(|| {
                Err(SqlMiddlewareDbError::ExecutionError(
                    "blocking execution suspended".to_string(),
                ))
            })
    }

    async fn execute<'c, C: DbConnection>(
        &self,
        connection: &'c mut C,
        command: &RelationalCommand,
        values: &ParameterValues,
        mode: ExecutionMode,
        shape: CallShape<'_>,
    ) -> Result<Executed<'c, C>, SqlMiddlewareDbError> {
        let mut state = ExecutionState::Idle;
        state.advance(ExecutionState::Preparing);

        let text = adjust_command_text(command.text());
        let bound = bind_parameters(command.parameters(), values)?;

        let opened_here = !connection.is_open();
        if opened_here {
            native_call!(shape, connection.open(), connection.open_async())?;
        }
        let mut scope = ConnectionScope {
            connection: Some(connection),
            close_on_drop: opened_here,
        };

        let conn = scope.connection()?;
        let context = CommandContext {
            command_id: Uuid::new_v4(),
            start_time: Utc::now(),
            parameters: render_parameters(&bound, self.options.log_parameter_values),
            connection_id: conn.connection_id(),
            timeout: self.options.command_timeout,
            transaction_id: conn.current_transaction(),
            command_text: text,
        };
        let spec = CommandSpec {
            text: context.command_text.clone(),
            timeout: context.timeout,
            transaction_id: context.transaction_id,
        };
        let mut native = CommandScope {
            command: Some(conn.create_command(&spec)?),
        };
        let cmd = native.command()?;
        for parameter in bound {
            cmd.add_parameter(parameter);
        }

        let is_async = shape.is_async();
        self.diagnostics.on_event(&CommandEvent::CommandExecuting {
            context: context.clone(),
            mode,
            is_async,
        });
        state.advance(ExecutionState::Executing);
        let started = Instant::now();

        let result = match mode {
            ExecutionMode::NonQuery => native_call!(
                shape,
                cmd.execute_non_query(),
                cmd.execute_non_query_async()
            )
            .map(NativeOutcome::Rows),
            ExecutionMode::Scalar => {
                native_call!(shape, cmd.execute_scalar(), cmd.execute_scalar_async())
                    .and_then(|value| decode_scalar(command, value))
                    .map(NativeOutcome::Scalar)
            }
            ExecutionMode::Reader => {
                native_call!(shape, cmd.execute_reader(), cmd.execute_reader_async())
                    .map(NativeOutcome::Cursor)
            }
        };
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                state.advance(ExecutionState::Failed);
                let error = attach_context(error, &context, elapsed);
                self.diagnostics.on_event(&CommandEvent::CommandError {
                    context,
                    mode,
                    error: CommandErrorInfo::from(&error),
                    elapsed,
                    is_async,
                });
                state.advance(ExecutionState::Released);
                return Err(error);
            }
        };

        state.advance(ExecutionState::Succeeded);
        self.diagnostics.on_event(&CommandEvent::CommandExecuted {
            context: context.clone(),
            mode,
            result: outcome.result(),
            elapsed,
            is_async,
        });

        let executed = match outcome {
            NativeOutcome::Rows(rows) => Executed::Rows(rows),
            NativeOutcome::Scalar(value) => Executed::Scalar(value),
            NativeOutcome::Cursor(cursor) => {
                let command = native.into_inner()?;
                let (connection, close_connection) = scope.hand_off()?;
                Executed::Reader(RelationalDataReader::new(
                    connection,
                    command,
                    cursor,
                    close_connection,
                    context,
                    Arc::clone(&self.diagnostics),
                    started,
                ))
            }
        };
        state.advance(ExecutionState::Released);
        Ok(executed)
    }
}

fn attach_context(
    error: SqlMiddlewareDbError,
    context: &CommandContext,
    elapsed: Duration,
) -> SqlMiddlewareDbError {
    match error {
        SqlMiddlewareDbError::Driver(source) => {
            SqlMiddlewareDbError::CommandFailed(Box::new(CommandFailure {
                command_text: context.command_text.clone(),
                parameters: context.parameters.clone(),
                elapsed,
                source,
            }))
        }
        other => other,
    }
}

fn decode_scalar(
    command: &RelationalCommand,
    value: NativeValue,
) -> Result<RowValues, SqlMiddlewareDbError> {
    match command.scalar_mapping() {
        Some(mapping) => mapping.from_native(value),
        None => untyped_from_native(value),
    }
}
