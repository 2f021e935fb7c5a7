use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// In-memory values handed to the binder and produced by the reader.
///
/// Reuse the same enum for parameters and decoded rows so callers never touch
/// provider-native shapes:
/// ```rust
/// use sql_middleware_oracle::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Fixed-point value
    Decimal(Decimal),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Time interval (day to second)
    Time(TimeDelta),
    /// Timestamp without offset
    Timestamp(NaiveDateTime),
    /// Timestamp carrying its UTC offset
    TimestampTz(DateTime<FixedOffset>),
    /// GUID value
    Guid(Uuid),
    /// Enum discriminant
    Enum(i64),
    /// Binary data
    Blob(Vec<u8>),
    /// NULL value
    Null,
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_guid(&self) -> Option<Uuid> {
        if let RowValues::Guid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp_tz(&self) -> Option<DateTime<FixedOffset>> {
        if let RowValues::TimestampTz(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "Int",
            RowValues::Float(_) => "Float",
            RowValues::Decimal(_) => "Decimal",
            RowValues::Text(_) => "Text",
            RowValues::Bool(_) => "Bool",
            RowValues::Date(_) => "Date",
            RowValues::Time(_) => "Time",
            RowValues::Timestamp(_) => "Timestamp",
            RowValues::TimestampTz(_) => "TimestampTz",
            RowValues::Guid(_) => "Guid",
            RowValues::Enum(_) => "Enum",
            RowValues::Blob(_) => "Blob",
            RowValues::Null => "Null",
        }
    }
}

/// Width of an integer kind, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

/// Width of a floating-point kind, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatWidth {
    W32,
    W64,
}

/// Engine-independent shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalKind {
    Integer(IntWidth),
    Floating(FloatWidth),
    Decimal,
    Boolean,
    String,
    Binary,
    Date,
    /// Day-to-second interval
    Time,
    DateTime,
    DateTimeOffset,
    Guid,
    /// Enum stored through its underlying integer
    Enum(IntWidth),
}

impl LogicalKind {
    /// Whether this kind is sized by a length facet.
    #[must_use]
    pub fn is_sized(self) -> bool {
        matches!(self, LogicalKind::String | LogicalKind::Binary)
    }
}

impl std::fmt::Display for LogicalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalKind::Integer(w) => write!(f, "integer({})", int_bits(*w)),
            LogicalKind::Floating(FloatWidth::W32) => f.write_str("floating(32)"),
            LogicalKind::Floating(FloatWidth::W64) => f.write_str("floating(64)"),
            LogicalKind::Decimal => f.write_str("decimal"),
            LogicalKind::Boolean => f.write_str("boolean"),
            LogicalKind::String => f.write_str("string"),
            LogicalKind::Binary => f.write_str("binary"),
            LogicalKind::Date => f.write_str("date"),
            LogicalKind::Time => f.write_str("time"),
            LogicalKind::DateTime => f.write_str("datetime"),
            LogicalKind::DateTimeOffset => f.write_str("datetime_with_offset"),
            LogicalKind::Guid => f.write_str("guid"),
            LogicalKind::Enum(w) => write!(f, "enum({})", int_bits(*w)),
        }
    }
}

fn int_bits(width: IntWidth) -> u8 {
    match width {
        IntWidth::W8 => 8,
        IntWidth::W16 => 16,
        IntWidth::W32 => 32,
        IntWidth::W64 => 64,
    }
}
