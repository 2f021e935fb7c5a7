//! Interface to the native database driver.
//!
//! The middleware never talks to the wire itself. A driver exposes connections,
//! commands and forward-only cursors through these traits; every suspending
//! operation has a blocking form and an `_async` counterpart whose default
//! implementation simply calls the blocking one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::params::BoundParameter;

/// Error raised by the native driver, carrying the engine error number when known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_driver_error(.code, .message))]
pub struct DriverError {
    /// Engine error number, e.g. `1940` for ORA-01940
    pub code: Option<i32>,
    pub message: String,
}

fn render_driver_error(code: &Option<i32>, message: &str) -> String {
    match code {
        Some(code) => format!("ORA-{code:05}: {message}"),
        None => message.to_string(),
    }
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_cast(ordinal: usize, wanted: &str, found: &NativeValue) -> Self {
        Self::new(format!(
            "column {ordinal}: cannot read {} as {wanted}",
            found.variant_name()
        ))
    }
}

/// The engine's timezone-aware timestamp: local wall-clock time plus its UTC offset as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTimestampTz {
    pub local: NaiveDateTime,
    /// Offset in `+hh:mm` / `-hh:mm` form
    pub offset: String,
}

/// Values as the native driver sends and returns them.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(NativeTimestampTz),
    Interval(TimeDelta),
}

impl NativeValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Length used for parameter sizing: characters for text, bytes for binary.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            NativeValue::Text(s) => Some(s.chars().count()),
            NativeValue::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }

    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            NativeValue::Null => "Null",
            NativeValue::Int(_) => "Int",
            NativeValue::Float(_) => "Float",
            NativeValue::Decimal(_) => "Decimal",
            NativeValue::Text(_) => "Text",
            NativeValue::Bytes(_) => "Bytes",
            NativeValue::Date(_) => "Date",
            NativeValue::Timestamp(_) => "Timestamp",
            NativeValue::TimestampTz(_) => "TimestampTz",
            NativeValue::Interval(_) => "Interval",
        }
    }
}

/// Native parameter type tags understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderTypeTag {
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    BinaryFloat,
    BinaryDouble,
    Varchar2,
    NVarchar2,
    Char,
    NChar,
    Clob,
    NClob,
    Raw,
    Blob,
    Date,
    TimeStamp,
    TimeStampTz,
    IntervalDs,
}

/// What the executor asks the driver to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub text: String,
    pub timeout: Option<Duration>,
    /// Transaction the command must enlist in, if the connection has one
    pub transaction_id: Option<Uuid>,
}

#[async_trait]
pub trait DbConnection: Send {
    type Command: DbCommand;

    fn connection_id(&self) -> Uuid;

    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<(), DriverError>;

    async fn open_async(&mut self) -> Result<(), DriverError> {
        self.open()
    }

    fn close(&mut self) -> Result<(), DriverError>;

    /// Ambient transaction the connection currently carries.
    fn current_transaction(&self) -> Option<Uuid> {
        None
    }

    fn create_command(&mut self, spec: &CommandSpec) -> Result<Self::Command, DriverError>;
}

/// A native command. Dropping it disposes it.
#[async_trait]
pub trait DbCommand: Send {
    type Cursor: DbCursor;

    fn add_parameter(&mut self, parameter: BoundParameter);

    fn parameter_count(&self) -> usize;

    fn clear_parameters(&mut self);

    fn execute_non_query(&mut self) -> Result<i64, DriverError>;

    async fn execute_non_query_async(&mut self) -> Result<i64, DriverError> {
        self.execute_non_query()
    }

    /// First column of the first row, `NativeValue::Null` when there are no rows.
    fn execute_scalar(&mut self) -> Result<NativeValue, DriverError>;

    async fn execute_scalar_async(&mut self) -> Result<NativeValue, DriverError> {
        self.execute_scalar()
    }

    fn execute_reader(&mut self) -> Result<Self::Cursor, DriverError>;

    async fn execute_reader_async(&mut self) -> Result<Self::Cursor, DriverError> {
        self.execute_reader()
    }
}

/// Forward-only cursor over a result.
///
/// Typed getters default to converting `get_value`; drivers override them when
/// they can read a column more directly. The engine has no native boolean, GUID
/// or offset-aware timestamp, so those getters fail unless a wrapper such as
/// [`crate::reader::ResultCursorAdapter`] supplies them.
#[async_trait]
pub trait DbCursor: Send {
    fn field_count(&self) -> usize;

    /// Rows changed by the statement, `-1` for queries.
    fn records_affected(&self) -> i64;

    fn has_rows(&self) -> bool;

    fn get_name(&self, ordinal: usize) -> Result<String, DriverError>;

    fn get_ordinal(&self, name: &str) -> Result<usize, DriverError>;

    fn get_data_type_name(&self, ordinal: usize) -> Result<String, DriverError>;

    fn get_value(&self, ordinal: usize) -> Result<NativeValue, DriverError>;

    fn is_null(&self, ordinal: usize) -> Result<bool, DriverError> {
        Ok(self.get_value(ordinal)?.is_null())
    }

    fn get_bool(&self, ordinal: usize) -> Result<bool, DriverError> {
        let value = self.get_value(ordinal)?;
        Err(DriverError::invalid_cast(ordinal, "boolean", &value))
    }

    fn get_u8(&self, ordinal: usize) -> Result<u8, DriverError> {
        let value = self.get_i64(ordinal)?;
        u8::try_from(value).map_err(|e| DriverError::new(format!("column {ordinal}: {e}")))
    }

    fn get_i16(&self, ordinal: usize) -> Result<i16, DriverError> {
        let value = self.get_i64(ordinal)?;
        i16::try_from(value).map_err(|e| DriverError::new(format!("column {ordinal}: {e}")))
    }

    fn get_i32(&self, ordinal: usize) -> Result<i32, DriverError> {
        let value = self.get_i64(ordinal)?;
        i32::try_from(value).map_err(|e| DriverError::new(format!("column {ordinal}: {e}")))
    }

    fn get_i64(&self, ordinal: usize) -> Result<i64, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Int(i) => Ok(i),
            NativeValue::Decimal(d) if d.fract().is_zero() => i64::try_from(d)
                .map_err(|e| DriverError::new(format!("column {ordinal}: {e}"))),
            other => Err(DriverError::invalid_cast(ordinal, "integer", &other)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn get_f32(&self, ordinal: usize) -> Result<f32, DriverError> {
        Ok(self.get_f64(ordinal)? as f32)
    }

    #[allow(clippy::cast_precision_loss)]
    fn get_f64(&self, ordinal: usize) -> Result<f64, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Float(f) => Ok(f),
            NativeValue::Int(i) => Ok(i as f64),
            other => Err(DriverError::invalid_cast(ordinal, "float", &other)),
        }
    }

    fn get_decimal(&self, ordinal: usize) -> Result<Decimal, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Decimal(d) => Ok(d),
            NativeValue::Int(i) => Ok(Decimal::from(i)),
            other => Err(DriverError::invalid_cast(ordinal, "decimal", &other)),
        }
    }

    fn get_string(&self, ordinal: usize) -> Result<String, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Text(s) => Ok(s),
            other => Err(DriverError::invalid_cast(ordinal, "string", &other)),
        }
    }

    fn get_date(&self, ordinal: usize) -> Result<NaiveDate, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Date(d) => Ok(d),
            NativeValue::Timestamp(ts) => Ok(ts.date()),
            other => Err(DriverError::invalid_cast(ordinal, "date", &other)),
        }
    }

    fn get_datetime(&self, ordinal: usize) -> Result<NaiveDateTime, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Timestamp(ts) => Ok(ts),
            other => Err(DriverError::invalid_cast(ordinal, "timestamp", &other)),
        }
    }

    fn get_interval(&self, ordinal: usize) -> Result<TimeDelta, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Interval(iv) => Ok(iv),
            other => Err(DriverError::invalid_cast(ordinal, "interval", &other)),
        }
    }

    fn get_timestamp_tz(&self, ordinal: usize) -> Result<NativeTimestampTz, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::TimestampTz(ts) => Ok(ts),
            other => Err(DriverError::invalid_cast(ordinal, "timestamp with time zone", &other)),
        }
    }

    fn get_datetime_offset(&self, ordinal: usize) -> Result<DateTime<FixedOffset>, DriverError> {
        let value = self.get_value(ordinal)?;
        Err(DriverError::invalid_cast(ordinal, "offset date-time", &value))
    }

    fn get_guid(&self, ordinal: usize) -> Result<Uuid, DriverError> {
        let value = self.get_value(ordinal)?;
        Err(DriverError::invalid_cast(ordinal, "guid", &value))
    }

    /// Copy bytes of a binary column starting at `data_offset`; returns the count copied.
    fn get_bytes(
        &self,
        ordinal: usize,
        data_offset: usize,
        buffer: &mut [u8],
    ) -> Result<usize, DriverError> {
        match self.get_value(ordinal)? {
            NativeValue::Bytes(bytes) => {
                let available = bytes.get(data_offset..).unwrap_or_default();
                let count = available.len().min(buffer.len());
                buffer[..count].copy_from_slice(&available[..count]);
                Ok(count)
            }
            other => Err(DriverError::invalid_cast(ordinal, "bytes", &other)),
        }
    }

    fn read(&mut self) -> Result<bool, DriverError>;

    async fn read_async(&mut self) -> Result<bool, DriverError> {
        self.read()
    }

    fn next_result(&mut self) -> Result<bool, DriverError>;

    async fn next_result_async(&mut self) -> Result<bool, DriverError> {
        self.next_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_renders_engine_code() {
        let err = DriverError::with_code(31, "your session has been marked for kill");
        assert_eq!(err.to_string(), "ORA-00031: your session has been marked for kill");
        assert_eq!(DriverError::new("boom").to_string(), "boom");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(NativeValue::Text("héllo".into()).length(), Some(5));
        assert_eq!(NativeValue::Bytes(vec![1, 2, 3]).length(), Some(3));
        assert_eq!(NativeValue::Int(4).length(), None);
    }
}
