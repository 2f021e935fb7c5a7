//! SQL literal rendering for each logical kind.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use super::TypeMapping;
use super::codec::guid_to_bytes;
use crate::error::SqlMiddlewareDbError;
use crate::types::{FloatWidth, LogicalKind, RowValues};

/// Digits rendered after the seconds of an interval literal.
pub const INTERVAL_FRACTION_DIGITS: usize = 3;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

impl TypeMapping {
    /// Render `value` as a SQL literal of this mapping.
    ///
    /// The user converter runs first, so a GUID stored through a text converter
    /// renders as a string literal. `Null` renders as `NULL`.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::LiteralError` for non-finite floats.
    pub fn to_sql_literal(&self, value: &RowValues) -> Result<String, SqlMiddlewareDbError> {
        let converted;
        let value = match self.converter() {
            Some(converter) => {
                converted = converter.to_provider(value);
                &converted
            }
            None => value,
        };

        Ok(match value {
            RowValues::Null => "NULL".to_string(),
            RowValues::Int(i) | RowValues::Enum(i) => i.to_string(),
            RowValues::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            RowValues::Float(f) => float_literal(*f, self.float_width())?,
            RowValues::Decimal(d) => d.to_string(),
            RowValues::Text(s) => string_literal(s, self.is_unicode()),
            RowValues::Blob(bytes) => hex_literal(bytes),
            RowValues::Guid(guid) => guid_literal(*guid),
            RowValues::Date(date) => date_literal(*date),
            RowValues::Timestamp(ts) => timestamp_literal(*ts),
            RowValues::TimestampTz(ts) => timestamp_tz_literal(*ts),
            RowValues::Time(delta) => interval_literal(*delta),
        })
    }

    fn float_width(&self) -> FloatWidth {
        match self.kind() {
            LogicalKind::Floating(width) => width,
            _ => FloatWidth::W64,
        }
    }
}

/// Quote `value`, doubling embedded quotes; national strings get the `N` prefix.
#[must_use]
pub fn string_literal(value: &str, unicode: bool) -> String {
    let escaped = value.replace('\'', "''");
    if unicode {
        format!("N'{escaped}'")
    } else {
        format!("'{escaped}'")
    }
}

#[must_use]
pub fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push('\'');
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}

#[must_use]
pub fn guid_literal(guid: Uuid) -> String {
    hex_literal(&guid_to_bytes(guid))
}

/// Shortest round-trip text, always carrying an exponent marker.
///
/// # Errors
/// Returns `SqlMiddlewareDbError::LiteralError` for NaN and infinities.
#[allow(clippy::cast_possible_truncation)]
pub fn float_literal(value: f64, width: FloatWidth) -> Result<String, SqlMiddlewareDbError> {
    if !value.is_finite() {
        return Err(SqlMiddlewareDbError::LiteralError(format!(
            "{value} has no SQL literal"
        )));
    }
    let text = match width {
        FloatWidth::W32 => shortest(value as f32),
        FloatWidth::W64 => shortest(value),
    };
    if text.contains(['E', 'e']) {
        Ok(text)
    } else {
        Ok(format!("{text}E0"))
    }
}

fn shortest<F>(value: F) -> String
where
    F: std::fmt::Display + std::fmt::LowerExp + std::fmt::UpperExp,
{
    let scientific = format!("{value:e}");
    let exponent = scientific
        .rsplit_once('e')
        .and_then(|(_, exp)| exp.parse::<i32>().ok())
        .unwrap_or(0);
    if exponent >= 15 || exponent < -5 {
        format!("{value:E}")
    } else {
        format!("{value}")
    }
}

#[must_use]
pub fn date_literal(date: NaiveDate) -> String {
    format!("DATE '{}'", date.format("%Y-%m-%d"))
}

#[must_use]
pub fn timestamp_literal(ts: NaiveDateTime) -> String {
    format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.3f"))
}

#[must_use]
pub fn timestamp_tz_literal(ts: DateTime<FixedOffset>) -> String {
    format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
}

#[must_use]
pub fn interval_literal(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let magnitude = if negative { -delta } else { delta };

    let total_seconds = magnitude.num_seconds();
    let days = total_seconds / SECONDS_PER_DAY;
    let hours = (total_seconds % SECONDS_PER_DAY) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let divisor = NANOS_PER_SECOND / 10_i64.pow(INTERVAL_FRACTION_DIGITS as u32);
    let fraction = i64::from(magnitude.subsec_nanos()) / divisor;

    format!(
        "INTERVAL '{sign}{days} {hours}:{minutes}:{seconds}.{fraction:0width$}' DAY TO SECOND",
        sign = if negative { "-" } else { "" },
        width = INTERVAL_FRACTION_DIGITS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ProviderTypeTag;

    fn double() -> TypeMapping {
        TypeMapping::builder(
            LogicalKind::Floating(FloatWidth::W64),
            "FLOAT(49)",
            ProviderTypeTag::BinaryDouble,
        )
        .build()
    }

    #[test]
    fn float_literal_always_has_exponent() {
        let mapping = double();
        assert_eq!(mapping.to_sql_literal(&RowValues::Float(1.5)).unwrap(), "1.5E0");
        assert_eq!(mapping.to_sql_literal(&RowValues::Float(1.5e20)).unwrap(), "1.5E20");
        assert_eq!(mapping.to_sql_literal(&RowValues::Float(-0.25)).unwrap(), "-0.25E0");
        assert_eq!(mapping.to_sql_literal(&RowValues::Float(1e-7)).unwrap(), "1E-7");
    }

    #[test]
    fn single_precision_uses_its_own_shortest_form() {
        let text = float_literal(0.1, FloatWidth::W32).unwrap();
        assert_eq!(text, "0.1E0");
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let err = float_literal(f64::NAN, FloatWidth::W64).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::LiteralError(_)));
    }

    #[test]
    fn interval_has_fixed_fraction_width() {
        let delta = TimeDelta::seconds(62);
        assert_eq!(
            interval_literal(delta),
            "INTERVAL '0 0:1:2.000' DAY TO SECOND"
        );
        let delta = -(TimeDelta::days(3) + TimeDelta::milliseconds(4_005));
        assert_eq!(
            interval_literal(delta),
            "INTERVAL '-3 0:0:4.005' DAY TO SECOND"
        );
    }

    #[test]
    fn hex_is_uppercase_and_quoted() {
        assert_eq!(hex_literal(&[0xab, 0x01]), "'AB01'");
        assert_eq!(hex_literal(&[]), "''");
    }
}
