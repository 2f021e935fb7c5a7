// Reading results
//
// - ResultCursorAdapter: fills the engine's gaps in the native cursor
// - data_reader: RelationalDataReader, the owning handle returned by the executor

mod data_reader;

pub use data_reader::RelationalDataReader;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::driver::{DbCursor, DriverError, NativeTimestampTz, NativeValue};
use crate::mapping::codec::{guid_from_bytes, offset_from_native};

/// Generate pass-through cursor methods.
macro_rules! forward_cursor {
    (
        $field:ident;
        $( fn $name:ident(&self $(, $arg:ident : $ty:ty)*) -> $ret:ty; )*
        $( mut fn $mname:ident(&mut self $(, $marg:ident : $mty:ty)*) -> $mret:ty; )*
    ) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.$field.$name($($arg),*)
            }
        )*
        $(
            fn $mname(&mut self $(, $marg: $mty)*) -> $mret {
                self.$field.$mname($($marg),*)
            }
        )*
    };
}

/// Decorates a native cursor with the reads the engine cannot do itself.
///
/// Booleans are stored as `NUMBER(1)`, GUIDs as `RAW(16)` and offset-aware
/// timestamps come back as the driver's timezone struct; every other call goes
/// straight to the wrapped cursor.
#[derive(Debug)]
pub struct ResultCursorAdapter<R> {
    inner: R,
}

impl<R: DbCursor> ResultCursorAdapter<R> {
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: DbCursor> DbCursor for ResultCursorAdapter<R> {
    forward_cursor! {
        inner;
        fn field_count(&self) -> usize;
        fn records_affected(&self) -> i64;
        fn has_rows(&self) -> bool;
        fn get_name(&self, ordinal: usize) -> Result<String, DriverError>;
        fn get_ordinal(&self, name: &str) -> Result<usize, DriverError>;
        fn get_data_type_name(&self, ordinal: usize) -> Result<String, DriverError>;
        fn get_value(&self, ordinal: usize) -> Result<NativeValue, DriverError>;
        fn is_null(&self, ordinal: usize) -> Result<bool, DriverError>;
        fn get_u8(&self, ordinal: usize) -> Result<u8, DriverError>;
        fn get_i16(&self, ordinal: usize) -> Result<i16, DriverError>;
        fn get_i32(&self, ordinal: usize) -> Result<i32, DriverError>;
        fn get_i64(&self, ordinal: usize) -> Result<i64, DriverError>;
        fn get_f32(&self, ordinal: usize) -> Result<f32, DriverError>;
        fn get_f64(&self, ordinal: usize) -> Result<f64, DriverError>;
        fn get_decimal(&self, ordinal: usize) -> Result<Decimal, DriverError>;
        fn get_string(&self, ordinal: usize) -> Result<String, DriverError>;
        fn get_date(&self, ordinal: usize) -> Result<NaiveDate, DriverError>;
        fn get_datetime(&self, ordinal: usize) -> Result<NaiveDateTime, DriverError>;
        fn get_interval(&self, ordinal: usize) -> Result<TimeDelta, DriverError>;
        fn get_timestamp_tz(&self, ordinal: usize) -> Result<NativeTimestampTz, DriverError>;
        fn get_bytes(&self, ordinal: usize, data_offset: usize, buffer: &mut [u8]) -> Result<usize, DriverError>;
        mut fn read(&mut self) -> Result<bool, DriverError>;
        mut fn next_result(&mut self) -> Result<bool, DriverError>;
    }

    fn get_bool(&self, ordinal: usize) -> Result<bool, DriverError> {
        Ok(self.inner.get_i64(ordinal)? == 1)
    }

    fn get_guid(&self, ordinal: usize) -> Result<Uuid, DriverError> {
        match self.inner.get_value(ordinal)? {
            NativeValue::Bytes(bytes) => guid_from_bytes(&bytes),
            other => Err(DriverError::invalid_cast(ordinal, "guid", &other)),
        }
    }

    fn get_datetime_offset(&self, ordinal: usize) -> Result<DateTime<FixedOffset>, DriverError> {
        offset_from_native(&self.inner.get_timestamp_tz(ordinal)?)
    }

    async fn read_async(&mut self) -> Result<bool, DriverError> {
        self.inner.read_async().await
    }

    async fn next_result_async(&mut self) -> Result<bool, DriverError> {
        self.inner.next_result_async().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryCursor;

    fn cursor(values: Vec<NativeValue>) -> ResultCursorAdapter<MemoryCursor> {
        let names = (0..values.len()).map(|i| format!("c{i}")).collect();
        let mut adapter = ResultCursorAdapter::new(MemoryCursor::new(names, vec![values]));
        assert!(adapter.read().unwrap());
        adapter
    }

    #[test]
    fn boolean_is_read_from_integer_flag() {
        let adapter = cursor(vec![NativeValue::Int(1), NativeValue::Int(0)]);
        assert!(adapter.get_bool(0).unwrap());
        assert!(!adapter.get_bool(1).unwrap());
        // the bare cursor cannot read booleans at all
        assert!(adapter.inner().get_bool(0).is_err());
    }

    #[test]
    fn guid_is_read_from_raw_bytes() {
        let guid = Uuid::new_v4();
        let adapter = cursor(vec![NativeValue::Bytes(guid.as_bytes().to_vec())]);
        assert_eq!(adapter.get_guid(0).unwrap(), guid);
    }

    #[test]
    fn offset_timestamp_is_rebuilt() {
        let local = NaiveDate::from_ymd_opt(2023, 11, 5)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        let adapter = cursor(vec![NativeValue::TimestampTz(NativeTimestampTz {
            local,
            offset: "+02:00".into(),
        })]);
        let value = adapter.get_datetime_offset(0).unwrap();
        assert_eq!(value.naive_local(), local);
        assert_eq!(value.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn other_reads_pass_through() {
        let adapter = cursor(vec![NativeValue::Text("abc".into()), NativeValue::Int(42)]);
        assert_eq!(adapter.get_string(0).unwrap(), "abc");
        assert_eq!(adapter.get_i32(1).unwrap(), 42);
        assert_eq!(adapter.field_count(), 2);
        assert_eq!(adapter.get_ordinal("c1").unwrap(), 1);
    }
}
