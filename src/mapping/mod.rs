// Type mappings - one immutable value object per (logical kind, store type) pair
//
// - store_type: store type name parsing
// - converter: user value converters
// - codec: built-in provider coercions
// - literal: SQL literal rendering
// - parameter: parameter sizing and type tags

pub mod codec;
pub mod converter;
pub mod literal;
pub mod parameter;
pub mod store_type;

pub use codec::ProviderCodec;
pub use converter::ValueConverter;
pub use store_type::{LengthUnit, ParsedStoreType, parse_store_type};

use crate::driver::{NativeValue, ProviderTypeTag};
use crate::error::SqlMiddlewareDbError;
use crate::types::{LogicalKind, RowValues};

/// Longest inline national (unicode) string, in characters.
pub const UNICODE_MAX_SIZE: u32 = 2000;
/// Longest inline ANSI string, in bytes.
pub const ANSI_MAX_SIZE: u32 = 4000;
/// Longest fixed-length (`CHAR`/`NCHAR`) string.
pub const FIXED_LENGTH_MAX_SIZE: u32 = 2000;
/// Longest inline `RAW` value, in bytes.
pub const BINARY_MAX_SIZE: u32 = 2000;
/// Default width of a unicode key/index column.
pub const UNICODE_KEY_SIZE: u32 = 450;
/// Default width of an ANSI key/index column.
pub const ANSI_KEY_SIZE: u32 = 900;
/// Default width of a binary key/index column.
pub const BINARY_KEY_SIZE: u32 = 900;
/// Width of a row-version column.
pub const ROW_VERSION_SIZE: u32 = 8;
/// Default decimal precision when none is declared.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 29;
/// Default decimal scale when none is declared.
pub const DEFAULT_DECIMAL_SCALE: u8 = 4;

/// Which facet, if any, is spelled inside the store type text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreTypePostfix {
    #[default]
    None,
    Size,
    PrecisionAndScale,
}

/// Secondary attributes of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MappingFacets {
    pub size: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub unicode: bool,
    pub fixed_length: bool,
    pub key_or_index: bool,
    pub row_version: bool,
}

/// One bidirectional mapping between a logical kind and a column type.
///
/// Mappings are immutable; `clone_with_store_type` and `clone_with_converter`
/// are the only ways to specialize one, and both re-derive the postfix and the
/// parameter clamp.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    kind: LogicalKind,
    store_type: String,
    postfix: StoreTypePostfix,
    facets: MappingFacets,
    provider_type: ProviderTypeTag,
    max_specific_size: Option<u32>,
    converter: Option<ValueConverter>,
}

impl TypeMapping {
    /// Start building a mapping.
    #[must_use]
    pub fn builder(
        kind: LogicalKind,
        store_type: impl Into<String>,
        provider_type: ProviderTypeTag,
    ) -> TypeMappingBuilder {
        TypeMappingBuilder {
            kind,
            store_type: store_type.into(),
            provider_type,
            facets: MappingFacets::default(),
            converter: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LogicalKind {
        self.kind
    }

    #[must_use]
    pub fn store_type(&self) -> &str {
        &self.store_type
    }

    #[must_use]
    pub fn postfix(&self) -> StoreTypePostfix {
        self.postfix
    }

    #[must_use]
    pub fn facets(&self) -> &MappingFacets {
        &self.facets
    }

    #[must_use]
    pub fn size(&self) -> Option<u32> {
        self.facets.size
    }

    #[must_use]
    pub fn precision(&self) -> Option<u8> {
        self.facets.precision
    }

    #[must_use]
    pub fn scale(&self) -> Option<u8> {
        self.facets.scale
    }

    #[must_use]
    pub fn is_unicode(&self) -> bool {
        self.facets.unicode
    }

    #[must_use]
    pub fn is_fixed_length(&self) -> bool {
        self.facets.fixed_length
    }

    #[must_use]
    pub fn is_key_or_index(&self) -> bool {
        self.facets.key_or_index
    }

    #[must_use]
    pub fn is_row_version(&self) -> bool {
        self.facets.row_version
    }

    #[must_use]
    pub fn provider_type(&self) -> ProviderTypeTag {
        self.provider_type
    }

    #[must_use]
    pub fn converter(&self) -> Option<&ValueConverter> {
        self.converter.as_ref()
    }

    /// Parameter size clamp, `None` for kinds that are not sized.
    #[must_use]
    pub fn max_specific_size(&self) -> Option<u32> {
        self.max_specific_size
    }

    /// Same mapping with a different store type and size.
    #[must_use]
    pub fn clone_with_store_type(&self, store_type: impl Into<String>, size: Option<u32>) -> Self {
        let store_type = store_type.into();
        let facets = MappingFacets { size, ..self.facets };
        Self {
            kind: self.kind,
            postfix: derive_postfix(self.kind, &store_type),
            max_specific_size: derive_max_specific_size(self.kind, &facets),
            store_type,
            facets,
            provider_type: self.provider_type,
            converter: self.converter.clone(),
        }
    }

    /// Same mapping with `converter` wrapped around any existing converter.
    #[must_use]
    pub fn clone_with_converter(&self, converter: ValueConverter) -> Self {
        let converter = match &self.converter {
            Some(existing) => existing.compose(&converter),
            None => converter,
        };
        Self {
            converter: Some(converter),
            ..self.clone()
        }
    }

    pub(crate) fn with_precision_and_scale(&self, precision: u8, scale: Option<u8>) -> Self {
        Self {
            facets: MappingFacets {
                precision: Some(precision),
                scale,
                ..self.facets
            },
            ..self.clone()
        }
    }

    /// Same mapping re-tagged with another kind, keeping store type and facets.
    pub(crate) fn retagged(&self, kind: LogicalKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn provider_codec(&self) -> ProviderCodec {
        ProviderCodec::new(self.kind)
    }

    /// Apply the user converter (if any) and the provider coercion.
    #[must_use]
    pub fn to_native(&self, value: &RowValues) -> NativeValue {
        let codec = self.provider_codec();
        match &self.converter {
            Some(converter) => codec.to_native(&converter.to_provider(value)),
            None => codec.to_native(value),
        }
    }

    /// Decode a driver value and run the user converter backwards.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ExecutionError` when the value cannot be read as this kind.
    pub fn from_native(&self, value: NativeValue) -> Result<RowValues, SqlMiddlewareDbError> {
        let decoded = self.provider_codec().from_native(value)?;
        Ok(match &self.converter {
            Some(converter) => converter.from_provider(&decoded),
            None => decoded,
        })
    }
}

impl PartialEq for TypeMapping {
    fn eq(&self, other: &Self) -> bool {
        let converters_match = match (&self.converter, &other.converter) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        self.kind == other.kind
            && self.store_type == other.store_type
            && self.postfix == other.postfix
            && self.facets == other.facets
            && self.provider_type == other.provider_type
            && self.max_specific_size == other.max_specific_size
            && converters_match
    }
}

/// Builder for [`TypeMapping`]; `build` derives the postfix and the clamp.
#[derive(Debug, Clone)]
pub struct TypeMappingBuilder {
    kind: LogicalKind,
    store_type: String,
    provider_type: ProviderTypeTag,
    facets: MappingFacets,
    converter: Option<ValueConverter>,
}

impl TypeMappingBuilder {
    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.facets.size = Some(size);
        self
    }

    #[must_use]
    pub fn precision_and_scale(mut self, precision: u8, scale: Option<u8>) -> Self {
        self.facets.precision = Some(precision);
        self.facets.scale = scale;
        self
    }

    #[must_use]
    pub fn unicode(mut self, unicode: bool) -> Self {
        self.facets.unicode = unicode;
        self
    }

    #[must_use]
    pub fn fixed_length(mut self, fixed_length: bool) -> Self {
        self.facets.fixed_length = fixed_length;
        self
    }

    #[must_use]
    pub fn key_or_index(mut self, key_or_index: bool) -> Self {
        self.facets.key_or_index = key_or_index;
        self
    }

    #[must_use]
    pub fn row_version(mut self, row_version: bool) -> Self {
        self.facets.row_version = row_version;
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: ValueConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn build(self) -> TypeMapping {
        TypeMapping {
            postfix: derive_postfix(self.kind, &self.store_type),
            max_specific_size: derive_max_specific_size(self.kind, &self.facets),
            kind: self.kind,
            store_type: self.store_type,
            facets: self.facets,
            provider_type: self.provider_type,
            converter: self.converter,
        }
    }
}

fn derive_postfix(kind: LogicalKind, store_type: &str) -> StoreTypePostfix {
    let Ok(parsed) = parse_store_type(store_type) else {
        return StoreTypePostfix::None;
    };
    match (parsed.first, parsed.second) {
        (None, _) => StoreTypePostfix::None,
        (Some(_), Some(_)) => StoreTypePostfix::PrecisionAndScale,
        (Some(_), None) if kind.is_sized() => StoreTypePostfix::Size,
        (Some(_), None) => StoreTypePostfix::PrecisionAndScale,
    }
}

/// Largest inline size for a sized kind with the given facets.
#[must_use]
pub fn inline_max_size(kind: LogicalKind, unicode: bool) -> Option<u32> {
    match kind {
        LogicalKind::String if unicode => Some(UNICODE_MAX_SIZE),
        LogicalKind::String => Some(ANSI_MAX_SIZE),
        LogicalKind::Binary => Some(BINARY_MAX_SIZE),
        _ => None,
    }
}

fn derive_max_specific_size(kind: LogicalKind, facets: &MappingFacets) -> Option<u32> {
    let max = inline_max_size(kind, facets.unicode)?;
    Some(match facets.size {
        Some(size) if size <= max => size,
        _ => max,
    })
}
