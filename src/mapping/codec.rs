//! Built-in provider coercions, independent of any user converter.

use chrono::{DateTime, FixedOffset, TimeZone};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::driver::{DriverError, NativeTimestampTz, NativeValue};
use crate::error::SqlMiddlewareDbError;
use crate::types::{LogicalKind, RowValues};

#[must_use]
pub fn guid_to_bytes(guid: Uuid) -> Vec<u8> {
    guid.as_bytes().to_vec()
}

/// # Errors
/// Returns `DriverError` unless exactly 16 bytes are supplied.
pub fn guid_from_bytes(bytes: &[u8]) -> Result<Uuid, DriverError> {
    Uuid::from_slice(bytes)
        .map_err(|e| DriverError::new(format!("expected 16 bytes for a GUID: {e}")))
}

/// Split an offset-aware timestamp into local time and `+hh:mm` text.
#[must_use]
pub fn offset_to_native(value: DateTime<FixedOffset>) -> NativeTimestampTz {
    NativeTimestampTz {
        local: value.naive_local(),
        offset: value.offset().to_string(),
    }
}

/// Rebuild an offset-aware timestamp from the engine's local time and offset text.
///
/// # Errors
/// Returns `DriverError` when the offset text is not `[+-]hh[:mm[:ss]]`.
pub fn offset_from_native(value: &NativeTimestampTz) -> Result<DateTime<FixedOffset>, DriverError> {
    let offset = parse_offset(&value.offset)
        .ok_or_else(|| DriverError::new(format!("invalid UTC offset '{}'", value.offset)))?;
    offset
        .from_local_datetime(&value.local)
        .single()
        .ok_or_else(|| DriverError::new(format!("ambiguous local time {}", value.local)))
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => (1, text),
    };
    let mut parts = rest.split(':').map(|part| {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse::<i32>().ok()
    });
    let hours = parts.next()??;
    let minutes = parts.next().unwrap_or(Some(0))?;
    let seconds = parts.next().unwrap_or(Some(0))?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}

/// The built-in coercion of one logical kind, applied after any user converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCodec {
    kind: LogicalKind,
}

impl ProviderCodec {
    #[must_use]
    pub fn new(kind: LogicalKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(&self) -> LogicalKind {
        self.kind
    }

    #[must_use]
    pub fn to_native(&self, value: &RowValues) -> NativeValue {
        to_native(value)
    }

    /// # Errors
    /// Returns `SqlMiddlewareDbError::ExecutionError` when `value` cannot be read as the kind.
    pub fn from_native(&self, value: NativeValue) -> Result<RowValues, SqlMiddlewareDbError> {
        from_native(self.kind, value)
    }
}

/// Coerce an in-memory value into the shape the driver binds.
pub(crate) fn to_native(value: &RowValues) -> NativeValue {
    match value {
        RowValues::Null => NativeValue::Null,
        RowValues::Int(i) | RowValues::Enum(i) => NativeValue::Int(*i),
        RowValues::Bool(b) => NativeValue::Int(i64::from(*b)),
        RowValues::Float(f) => NativeValue::Float(*f),
        RowValues::Decimal(d) => NativeValue::Decimal(*d),
        RowValues::Text(s) => NativeValue::Text(s.clone()),
        RowValues::Blob(b) => NativeValue::Bytes(b.clone()),
        RowValues::Guid(g) => NativeValue::Bytes(guid_to_bytes(*g)),
        RowValues::Date(d) => NativeValue::Date(*d),
        RowValues::Time(t) => NativeValue::Interval(*t),
        RowValues::Timestamp(ts) => NativeValue::Timestamp(*ts),
        RowValues::TimestampTz(ts) => NativeValue::TimestampTz(offset_to_native(*ts)),
    }
}

/// Decode a driver value into the in-memory shape of `kind`.
pub(crate) fn from_native(
    kind: LogicalKind,
    value: NativeValue,
) -> Result<RowValues, SqlMiddlewareDbError> {
    let decoded = match (kind, value) {
        (_, NativeValue::Null) => RowValues::Null,
        (LogicalKind::Boolean, NativeValue::Int(i)) => RowValues::Bool(i == 1),
        (LogicalKind::Boolean, NativeValue::Decimal(d)) => RowValues::Bool(d == Decimal::ONE),
        (LogicalKind::Guid, NativeValue::Bytes(b)) => RowValues::Guid(guid_from_bytes(&b)?),
        (LogicalKind::DateTimeOffset, NativeValue::TimestampTz(ts)) => {
            RowValues::TimestampTz(offset_from_native(&ts)?)
        }
        (LogicalKind::Enum(_), NativeValue::Int(i)) => RowValues::Enum(i),
        (LogicalKind::Integer(_), NativeValue::Int(i)) => RowValues::Int(i),
        (LogicalKind::Enum(_) | LogicalKind::Integer(_), NativeValue::Decimal(d)) => {
            let i = d.to_i64().ok_or_else(|| {
                SqlMiddlewareDbError::ExecutionError(format!("{d} does not fit an integer"))
            })?;
            if matches!(kind, LogicalKind::Enum(_)) {
                RowValues::Enum(i)
            } else {
                RowValues::Int(i)
            }
        }
        (LogicalKind::Floating(_), NativeValue::Float(f)) => RowValues::Float(f),
        (LogicalKind::Floating(_), NativeValue::Decimal(d)) => {
            RowValues::Float(d.to_f64().ok_or_else(|| {
                SqlMiddlewareDbError::ExecutionError(format!("{d} does not fit a double"))
            })?)
        }
        (LogicalKind::Decimal, NativeValue::Decimal(d)) => RowValues::Decimal(d),
        (LogicalKind::Decimal, NativeValue::Int(i)) => RowValues::Decimal(Decimal::from(i)),
        (LogicalKind::String, NativeValue::Text(s)) => RowValues::Text(s),
        (LogicalKind::Binary, NativeValue::Bytes(b)) => RowValues::Blob(b),
        (LogicalKind::Date, NativeValue::Date(d)) => RowValues::Date(d),
        (LogicalKind::Date, NativeValue::Timestamp(ts)) => RowValues::Date(ts.date()),
        (LogicalKind::Time, NativeValue::Interval(iv)) => RowValues::Time(iv),
        (LogicalKind::DateTime, NativeValue::Timestamp(ts)) => RowValues::Timestamp(ts),
        (kind, other) => {
            return Err(SqlMiddlewareDbError::ExecutionError(format!(
                "cannot decode {} as {kind}",
                other.variant_name()
            )));
        }
    };
    Ok(decoded)
}

/// Decode a driver value by its own shape, for columns read without a mapping.
pub(crate) fn untyped_from_native(value: NativeValue) -> Result<RowValues, SqlMiddlewareDbError> {
    Ok(match value {
        NativeValue::Null => RowValues::Null,
        NativeValue::Int(i) => RowValues::Int(i),
        NativeValue::Float(f) => RowValues::Float(f),
        NativeValue::Decimal(d) => RowValues::Decimal(d),
        NativeValue::Text(s) => RowValues::Text(s),
        NativeValue::Bytes(b) => RowValues::Blob(b),
        NativeValue::Date(d) => RowValues::Date(d),
        NativeValue::Timestamp(ts) => RowValues::Timestamp(ts),
        NativeValue::TimestampTz(ts) => RowValues::TimestampTz(offset_from_native(&ts)?),
        NativeValue::Interval(iv) => RowValues::Time(iv),
    })
}
