use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::ResultCursorAdapter;
use crate::command::shape::cancellable;
use crate::diagnostics::{CommandContext, CommandEvent, DiagnosticsListener};
use crate::driver::{DbCommand, DbConnection, DbCursor};
use crate::error::SqlMiddlewareDbError;
use crate::mapping::TypeMapping;
use crate::mapping::codec::untyped_from_native;
use crate::results::ResultSet;
use crate::types::{LogicalKind, RowValues};

type CursorOf<C> = <<C as DbConnection>::Command as DbCommand>::Cursor;

/// Forward-only reader returned by `execute_reader`.
///
/// The reader owns the native command and, when the executor opened the
/// connection, the duty to close it. Call [`RelationalDataReader::close`] to
/// observe release errors; dropping the reader releases too and logs them.
pub struct RelationalDataReader<'c, C: DbConnection> {
    connection: &'c mut C,
    command: Option<C::Command>,
    cursor: Option<ResultCursorAdapter<CursorOf<C>>>,
    close_connection: bool,
    context: CommandContext,
    diagnostics: Arc<dyn DiagnosticsListener>,
    started: Instant,
    released: bool,
}

impl<'c, C: DbConnection> RelationalDataReader<'c, C> {
    pub(crate) fn new(
        connection: &'c mut C,
        command: C::Command,
        cursor: CursorOf<C>,
        close_connection: bool,
        context: CommandContext,
        diagnostics: Arc<dyn DiagnosticsListener>,
        started: Instant,
    ) -> Self {
        Self {
            connection,
            command: Some(command),
            cursor: Some(ResultCursorAdapter::new(cursor)),
            close_connection,
            context,
            diagnostics,
            started,
            released: false,
        }
    }

    /// The adapted cursor, for typed reads of the current row.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ExecutionError` once the reader is closed.
    pub fn cursor(&self) -> Result<&ResultCursorAdapter<CursorOf<C>>, SqlMiddlewareDbError> {
        self.cursor
            .as_ref()
            .ok_or_else(|| SqlMiddlewareDbError::ExecutionError("reader is closed".to_string()))
    }

    fn cursor_mut(&mut self) -> Result<&mut ResultCursorAdapter<CursorOf<C>>, SqlMiddlewareDbError> {
        self.cursor
            .as_mut()
            .ok_or_else(|| SqlMiddlewareDbError::ExecutionError("reader is closed".to_string()))
    }

    #[must_use]
    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Whether closing the reader also closes the connection.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        self.close_connection
    }

    /// # Errors
    /// Returns the driver error if the cursor cannot advance.
    pub fn read(&mut self) -> Result<bool, SqlMiddlewareDbError> {
        Ok(self.cursor_mut()?.read()?)
    }

    /// Advance to the next row, giving up when `cancel` fires first.
    ///
    /// # Errors
    /// Returns the driver error if the cursor cannot advance, or `Cancelled`.
    /// The reader still releases its command and connection afterwards.
    pub async fn read_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<bool, SqlMiddlewareDbError> {
        let cursor = self.cursor_mut()?;
        cancellable(cancel, cursor.read_async()).await
    }

    /// # Errors
    /// Returns the driver error if the next result cannot be reached.
    pub fn next_result(&mut self) -> Result<bool, SqlMiddlewareDbError> {
        Ok(self.cursor_mut()?.next_result()?)
    }

    /// # Errors
    /// Returns the driver error if the next result cannot be reached, or `Cancelled`.
    pub async fn next_result_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<bool, SqlMiddlewareDbError> {
        let cursor = self.cursor_mut()?;
        cancellable(cancel, cursor.next_result_async()).await
    }

    /// Decode a column of the current row through `mapping`.
    ///
    /// # Errors
    /// Returns the driver error, or `ExecutionError` when the value does not fit the kind.
    pub fn read_value(
        &self,
        ordinal: usize,
        mapping: &TypeMapping,
    ) -> Result<RowValues, SqlMiddlewareDbError> {
        let cursor = self.cursor()?;
        if cursor.is_null(ordinal)? {
            return Ok(RowValues::Null);
        }
        let decoded = match mapping.kind() {
            LogicalKind::Boolean => RowValues::Bool(cursor.get_bool(ordinal)?),
            LogicalKind::Guid => RowValues::Guid(cursor.get_guid(ordinal)?),
            LogicalKind::DateTimeOffset => {
                RowValues::TimestampTz(cursor.get_datetime_offset(ordinal)?)
            }
            _ => return mapping.from_native(cursor.get_value(ordinal)?),
        };
        Ok(match mapping.converter() {
            Some(converter) => converter.from_provider(&decoded),
            None => decoded,
        })
    }

    /// Drain the current result into a `ResultSet`.
    ///
    /// Column `i` is decoded through `mappings[i]` when present and by value
    /// shape otherwise.
    ///
    /// # Errors
    /// Returns the first read or decode error.
    pub fn buffer(&mut self, mappings: &[TypeMapping]) -> Result<ResultSet, SqlMiddlewareDbError> {
        let mut result_set = self.start_buffer()?;
        while self.read()? {
            result_set.add_row_values(self.current_row(mappings)?);
        }
        Ok(result_set)
    }

    /// Async form of [`RelationalDataReader::buffer`].
    ///
    /// # Errors
    /// Returns the first read or decode error, or `Cancelled` when `cancel`
    /// fires during a read.
    pub async fn buffer_async(
        &mut self,
        mappings: &[TypeMapping],
        cancel: &CancellationToken,
    ) -> Result<ResultSet, SqlMiddlewareDbError> {
        let mut result_set = self.start_buffer()?;
        while self.read_async(cancel).await? {
            result_set.add_row_values(self.current_row(mappings)?);
        }
        Ok(result_set)
    }

    fn start_buffer(&self) -> Result<ResultSet, SqlMiddlewareDbError> {
        let cursor = self.cursor()?;
        let names = (0..cursor.field_count())
            .map(|i| cursor.get_name(i))
            .collect::<Result<Vec<_>, _>>()?;
        let mut result_set = ResultSet::with_capacity(16);
        result_set.set_column_names(Arc::new(names));
        Ok(result_set)
    }

    fn current_row(&self, mappings: &[TypeMapping]) -> Result<Vec<RowValues>, SqlMiddlewareDbError> {
        let cursor = self.cursor()?;
        (0..cursor.field_count())
            .map(|i| match mappings.get(i) {
                Some(mapping) => self.read_value(i, mapping),
                None => untyped_from_native(cursor.get_value(i)?),
            })
            .collect()
    }

    /// Release the command and, if owned, the connection.
    ///
    /// # Errors
    /// Returns the driver error raised while closing the connection.
    pub fn close(mut self) -> Result<(), SqlMiddlewareDbError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), SqlMiddlewareDbError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let records_affected = self.cursor.as_ref().map_or(-1, |c| c.records_affected());
        self.diagnostics.on_event(&CommandEvent::DataReaderDisposing {
            command_id: self.context.command_id,
            connection_id: self.context.connection_id,
            command_text: self.context.command_text.clone(),
            records_affected,
            elapsed: self.started.elapsed(),
        });

        self.cursor = None;
        if let Some(mut command) = self.command.take() {
            command.clear_parameters();
        }
        if self.close_connection {
            self.connection.close()?;
        }
        Ok(())
    }
}

impl<C: DbConnection> Drop for RelationalDataReader<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                connection_id = %self.context.connection_id,
                "failed to close connection while disposing reader: {e}"
            );
        }
    }
}

impl<C: DbConnection> std::fmt::Debug for RelationalDataReader<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalDataReader")
            .field("context", &self.context)
            .field("close_connection", &self.close_connection)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
