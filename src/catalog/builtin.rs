//! The built-in Oracle mapping table.

use super::CatalogEntry;
use crate::driver::ProviderTypeTag as Tag;
use crate::mapping::{
    ANSI_MAX_SIZE, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, TypeMapping,
    UNICODE_MAX_SIZE,
};
use crate::types::{FloatWidth, IntWidth, LogicalKind as Kind};

/// Character and binary names that must carry a length to be usable.
pub(super) const DISALLOWED_BARE_NAMES: &[&str] = &[
    "BINARY VARYING",
    "BINARY",
    "CHAR VARYING",
    "CHAR",
    "CHARACTER VARYING",
    "CHARACTER",
    "NATIONAL CHAR VARYING",
    "NATIONAL CHARACTER VARYING",
    "NATIONAL CHARACTER",
    "NCHAR",
    "NVARCHAR2",
    "VARCHAR2",
    "RAW",
];

fn number(kind: Kind, store_type: &str, tag: Tag, precision: u8) -> TypeMapping {
    TypeMapping::builder(kind, store_type, tag)
        .precision_and_scale(precision, None)
        .build()
}

fn plain(kind: Kind, store_type: &str, tag: Tag) -> TypeMapping {
    TypeMapping::builder(kind, store_type, tag).build()
}

pub(super) fn entries() -> Vec<CatalogEntry> {
    vec![
        // integers and flags
        CatalogEntry::default_for_kind(number(Kind::Integer(IntWidth::W8), "NUMBER(3)", Tag::Byte, 3)),
        CatalogEntry::default_for_kind(number(Kind::Integer(IntWidth::W16), "NUMBER(6)", Tag::Int16, 6)),
        CatalogEntry::default_for_kind(number(Kind::Integer(IntWidth::W32), "NUMBER(10)", Tag::Int32, 10)),
        CatalogEntry::default_for_kind(number(Kind::Integer(IntWidth::W64), "NUMBER(19)", Tag::Int64, 19)),
        CatalogEntry::default_for_kind(number(Kind::Boolean, "NUMBER(1)", Tag::Int16, 1)),
        // floating point
        CatalogEntry::default_for_kind(
            TypeMapping::builder(Kind::Floating(FloatWidth::W64), "FLOAT(49)", Tag::BinaryDouble)
                .precision_and_scale(49, None)
                .build(),
        ),
        CatalogEntry::default_for_kind(plain(Kind::Floating(FloatWidth::W32), "REAL", Tag::BinaryFloat)),
        CatalogEntry::new(plain(Kind::Floating(FloatWidth::W64), "BINARY_DOUBLE", Tag::BinaryDouble)),
        CatalogEntry::new(plain(Kind::Floating(FloatWidth::W32), "BINARY_FLOAT", Tag::BinaryFloat)),
        CatalogEntry::new(plain(Kind::Floating(FloatWidth::W64), "FLOAT", Tag::BinaryDouble)),
        // fixed point
        CatalogEntry::default_for_kind(
            TypeMapping::builder(Kind::Decimal, "DECIMAL(29,4)", Tag::Decimal)
                .precision_and_scale(DEFAULT_DECIMAL_PRECISION, Some(DEFAULT_DECIMAL_SCALE))
                .build(),
        ),
        CatalogEntry::new(plain(Kind::Decimal, "DECIMAL", Tag::Decimal)),
        CatalogEntry::new(plain(Kind::Decimal, "NUMBER", Tag::Decimal)),
        CatalogEntry::new(plain(Kind::Decimal, "NUMERIC", Tag::Decimal)),
        // dates and times
        CatalogEntry::default_for_kind(plain(Kind::Date, "DATE", Tag::Date)),
        CatalogEntry::new(plain(Kind::DateTime, "DATE", Tag::Date)),
        CatalogEntry::default_for_kind(plain(Kind::DateTime, "TIMESTAMP", Tag::TimeStamp)),
        CatalogEntry::default_for_kind(plain(
            Kind::DateTimeOffset,
            "TIMESTAMP WITH TIME ZONE",
            Tag::TimeStampTz,
        )),
        CatalogEntry::default_for_kind(plain(Kind::Time, "INTERVAL DAY TO SECOND", Tag::IntervalDs)),
        // identifiers and raw bytes
        CatalogEntry::default_for_kind(
            TypeMapping::builder(Kind::Guid, "RAW(16)", Tag::Raw)
                .size(16)
                .fixed_length(true)
                .build(),
        ),
        CatalogEntry::new(TypeMapping::builder(Kind::Binary, "RAW(16)", Tag::Raw).size(16).build()),
        CatalogEntry::new(TypeMapping::builder(Kind::Binary, "RAW", Tag::Raw).build()),
        CatalogEntry::new(plain(Kind::Binary, "BLOB", Tag::Blob)),
        // character data
        CatalogEntry::new(
            TypeMapping::builder(Kind::String, "NVARCHAR2", Tag::NVarchar2)
                .unicode(true)
                .size(UNICODE_MAX_SIZE)
                .build(),
        ),
        CatalogEntry::new(
            TypeMapping::builder(Kind::String, "VARCHAR2", Tag::Varchar2)
                .size(ANSI_MAX_SIZE)
                .build(),
        ),
        CatalogEntry::new(
            TypeMapping::builder(Kind::String, "NCHAR", Tag::NChar)
                .unicode(true)
                .fixed_length(true)
                .build(),
        ),
        CatalogEntry::new(
            TypeMapping::builder(Kind::String, "CHAR", Tag::Char)
                .fixed_length(true)
                .build(),
        ),
        CatalogEntry::new(TypeMapping::builder(Kind::String, "NCLOB", Tag::NClob).unicode(true).build()),
        CatalogEntry::new(plain(Kind::String, "CLOB", Tag::Clob)),
    ]
}
