use std::sync::LazyLock;

use regex::Regex;

use crate::error::SqlMiddlewareDbError;

static STORE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*([^(]+)(?:\(\s*(\d+)\s*((?i:CHAR|BYTE))?\s*(?:,\s*(\d+)\s*)?\))?(.*)$",
    )
    .unwrap_or_else(|e| panic!("store type pattern is invalid: {e}"))
});

/// Length qualifier of a string size, as in `VARCHAR2(50 CHAR)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Char,
    Byte,
}

/// A store type name split into its base name and facet annotation.
///
/// `TIMESTAMP(3) WITH TIME ZONE` parses to base `TIMESTAMP`, first facet `3`
/// and suffix `WITH TIME ZONE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStoreType {
    pub base: String,
    pub first: Option<u32>,
    pub unit: Option<LengthUnit>,
    pub second: Option<u32>,
    pub suffix: String,
}

impl ParsedStoreType {
    /// Whether the name carries an explicit `(n)` or `(p, s)` annotation.
    #[must_use]
    pub fn has_facets(&self) -> bool {
        self.first.is_some()
    }

    /// Base name with the suffix re-attached, e.g. `TIMESTAMP WITH TIME ZONE`.
    #[must_use]
    pub fn name_without_facets(&self) -> String {
        if self.suffix.is_empty() {
            self.base.clone()
        } else {
            format!("{} {}", self.base, self.suffix)
        }
    }
}

/// Split a store type name. Names the pattern cannot read are returned whole as the base.
///
/// # Errors
/// Returns `SqlMiddlewareDbError::InvalidStoreType` when a facet does not fit in 32 bits.
pub fn parse_store_type(store_type: &str) -> Result<ParsedStoreType, SqlMiddlewareDbError> {
    let Some(caps) = STORE_TYPE.captures(store_type) else {
        return Ok(ParsedStoreType {
            base: store_type.trim().to_string(),
            first: None,
            unit: None,
            second: None,
            suffix: String::new(),
        });
    };

    let number = |idx: usize| -> Result<Option<u32>, SqlMiddlewareDbError> {
        caps.get(idx)
            .map(|m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|_| SqlMiddlewareDbError::InvalidStoreType {
                        store_type: store_type.trim().to_string(),
                        reason: format!("facet {} is out of range", m.as_str()),
                    })
            })
            .transpose()
    };
    let unit = caps.get(3).map(|m| {
        if m.as_str().eq_ignore_ascii_case("CHAR") {
            LengthUnit::Char
        } else {
            LengthUnit::Byte
        }
    });

    Ok(ParsedStoreType {
        base: caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        first: number(2)?,
        unit,
        second: number(4)?,
        suffix: caps
            .get(5)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(store_type: &str) -> ParsedStoreType {
        parse_store_type(store_type).unwrap()
    }

    #[test]
    fn parses_size() {
        let parsed = parse("NVARCHAR2(37)");
        assert_eq!(parsed.base, "NVARCHAR2");
        assert_eq!(parsed.first, Some(37));
        assert_eq!(parsed.second, None);
        assert_eq!(parsed.unit, None);
        assert!(parsed.suffix.is_empty());
    }

    #[test]
    fn parses_precision_and_scale_with_spaces() {
        let parsed = parse(" DECIMAL ( 29 , 4 ) ");
        assert_eq!(parsed.base, "DECIMAL");
        assert_eq!(parsed.first, Some(29));
        assert_eq!(parsed.second, Some(4));
    }

    #[test]
    fn keeps_suffix_after_facets() {
        let parsed = parse("TIMESTAMP(3) WITH TIME ZONE");
        assert_eq!(parsed.base, "TIMESTAMP");
        assert_eq!(parsed.first, Some(3));
        assert_eq!(parsed.name_without_facets(), "TIMESTAMP WITH TIME ZONE");
    }

    #[test]
    fn bare_multi_word_name() {
        let parsed = parse("national character varying");
        assert_eq!(parsed.base, "national character varying");
        assert!(!parsed.has_facets());
    }

    #[test]
    fn length_qualifiers() {
        let chars = parse("VARCHAR2(50 CHAR)");
        assert_eq!(chars.base, "VARCHAR2");
        assert_eq!(chars.first, Some(50));
        assert_eq!(chars.unit, Some(LengthUnit::Char));
        assert!(chars.suffix.is_empty());

        let bytes = parse("varchar2(20 byte)");
        assert_eq!(bytes.first, Some(20));
        assert_eq!(bytes.unit, Some(LengthUnit::Byte));
    }

    #[test]
    fn oversized_facet_is_an_error() {
        let err = parse_store_type("VARCHAR2(99999999999)").unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::InvalidStoreType { .. }));
    }
}
