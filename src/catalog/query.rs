use crate::types::LogicalKind;

/// What a caller knows about a column when asking the catalog for a mapping.
///
/// ```rust
/// use sql_middleware_oracle::prelude::*;
///
/// let query = MappingQuery::for_kind(LogicalKind::String)
///     .size(37)
///     .unicode(false);
/// let mapping = TypeMappingCatalog::oracle().resolve(&query).unwrap();
/// assert_eq!(mapping.store_type(), "VARCHAR2(37)");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingQuery {
    pub kind: Option<LogicalKind>,
    pub store_type: Option<String>,
    pub size: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub unicode: Option<bool>,
    pub fixed_length: Option<bool>,
    pub key_or_index: Option<bool>,
    pub row_version: Option<bool>,
}

impl MappingQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_kind(kind: LogicalKind) -> Self {
        Self::new().kind(kind)
    }

    #[must_use]
    pub fn for_store_type(store_type: impl Into<String>) -> Self {
        Self::new().store_type(store_type)
    }

    #[must_use]
    pub fn kind(mut self, kind: LogicalKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn store_type(mut self, store_type: impl Into<String>) -> Self {
        self.store_type = Some(store_type.into());
        self
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn unicode(mut self, unicode: bool) -> Self {
        self.unicode = Some(unicode);
        self
    }

    #[must_use]
    pub fn fixed_length(mut self, fixed_length: bool) -> Self {
        self.fixed_length = Some(fixed_length);
        self
    }

    #[must_use]
    pub fn key_or_index(mut self, key_or_index: bool) -> Self {
        self.key_or_index = Some(key_or_index);
        self
    }

    #[must_use]
    pub fn row_version(mut self, row_version: bool) -> Self {
        self.row_version = Some(row_version);
        self
    }
}
