// Type mapping catalog
//
// - query: MappingQuery builder
// - builtin: the Oracle table the shared catalog is built from

mod builtin;
pub mod query;

pub use query::MappingQuery;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use tracing::trace;

use crate::driver::ProviderTypeTag;
use crate::error::SqlMiddlewareDbError;
use crate::mapping::{
    ANSI_KEY_SIZE, ANSI_MAX_SIZE, BINARY_KEY_SIZE, BINARY_MAX_SIZE, FIXED_LENGTH_MAX_SIZE,
    ParsedStoreType, ROW_VERSION_SIZE, TypeMapping, UNICODE_KEY_SIZE, UNICODE_MAX_SIZE,
    parse_store_type,
};
use crate::types::LogicalKind;

static ORACLE: LazyLock<TypeMappingCatalog> = LazyLock::new(|| {
    TypeMappingCatalog::from_entries(builtin::entries(), builtin::DISALLOWED_BARE_NAMES)
        .unwrap_or_else(|e| panic!("built-in mapping table is inconsistent: {e}"))
});

/// One row of the declarative table a catalog is built from.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub mapping: TypeMapping,
    /// Whether this mapping answers kind-only queries
    pub is_default: bool,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(mapping: TypeMapping) -> Self {
        Self {
            mapping,
            is_default: false,
        }
    }

    #[must_use]
    pub fn default_for_kind(mapping: TypeMapping) -> Self {
        Self {
            mapping,
            is_default: true,
        }
    }
}

/// Immutable lookup tables from store type names and logical kinds to mappings.
#[derive(Debug, Clone)]
pub struct TypeMappingCatalog {
    by_store_type: HashMap<String, Vec<TypeMapping>>,
    by_kind: HashMap<LogicalKind, TypeMapping>,
    disallowed: HashSet<String>,
}

impl TypeMappingCatalog {
    /// The shared catalog for the Oracle dialect.
    #[must_use]
    pub fn oracle() -> &'static TypeMappingCatalog {
        &ORACLE
    }

    /// Build a catalog from a declarative table.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` when two entries share a
    /// store type name and kind, or two defaults claim the same kind.
    pub fn from_entries(
        entries: impl IntoIterator<Item = CatalogEntry>,
        disallowed: &[&str],
    ) -> Result<Self, SqlMiddlewareDbError> {
        let mut by_store_type: HashMap<String, Vec<TypeMapping>> = HashMap::new();
        let mut by_kind = HashMap::new();

        for entry in entries {
            let key = normalize(entry.mapping.store_type());
            let kind = entry.mapping.kind();
            let slot = by_store_type.entry(key.clone()).or_default();
            if slot.iter().any(|m| m.kind() == kind) {
                return Err(SqlMiddlewareDbError::ConfigError(format!(
                    "duplicate mapping for store type '{key}' and kind {kind}"
                )));
            }
            if entry.is_default && by_kind.insert(kind, entry.mapping.clone()).is_some() {
                return Err(SqlMiddlewareDbError::ConfigError(format!(
                    "more than one default mapping for kind {kind}"
                )));
            }
            slot.push(entry.mapping);
        }

        Ok(Self {
            by_store_type,
            by_kind,
            disallowed: disallowed.iter().map(|name| normalize(name)).collect(),
        })
    }

    /// Whether `store_type` names a type that is only usable with a facet annotation.
    #[must_use]
    pub fn is_disallowed(&self, store_type: &str) -> bool {
        parse_store_type(store_type).is_ok_and(|parsed| self.is_disallowed_parsed(&parsed))
    }

    fn is_disallowed_parsed(&self, parsed: &ParsedStoreType) -> bool {
        !parsed.has_facets() && self.disallowed.contains(&normalize(&parsed.name_without_facets()))
    }

    /// Default mapping of `kind`, as a kind-only query resolves it.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::NoMapping` when the kind has no default.
    pub fn find_by_kind(&self, kind: LogicalKind) -> Result<TypeMapping, SqlMiddlewareDbError> {
        self.resolve(&MappingQuery::for_kind(kind))
    }

    /// Mapping of a store type name with no kind hint.
    ///
    /// # Errors
    /// See [`TypeMappingCatalog::resolve`].
    pub fn find_by_store_type(&self, store_type: &str) -> Result<TypeMapping, SqlMiddlewareDbError> {
        self.resolve(&MappingQuery::for_store_type(store_type))
    }

    /// Resolve a query to exactly one mapping.
    ///
    /// # Errors
    /// - `InvalidStoreType` when a facet of the store type is out of range
    /// - `DisallowedType` for a bare name that requires a facet
    /// - `AmbiguousType` when a store type maps to several kinds and none was given
    /// - `NoMapping` when nothing matches
    pub fn resolve(&self, query: &MappingQuery) -> Result<TypeMapping, SqlMiddlewareDbError> {
        if let Some(LogicalKind::Enum(width)) = query.kind {
            let underlying = MappingQuery {
                kind: Some(LogicalKind::Integer(width)),
                ..query.clone()
            };
            return Ok(self.resolve(&underlying)?.retagged(LogicalKind::Enum(width)));
        }

        if query.row_version == Some(true) {
            trace!("row version column resolves to RAW({ROW_VERSION_SIZE})");
            return Ok(row_version_mapping());
        }

        match (&query.store_type, query.kind) {
            (Some(store_type), kind) => self.resolve_store_type(store_type, kind, query),
            (None, Some(kind)) => self.resolve_kind(kind, query),
            (None, None) => Err(SqlMiddlewareDbError::NoMapping(
                "query names neither a kind nor a store type".to_string(),
            )),
        }
    }

    fn resolve_store_type(
        &self,
        store_type: &str,
        kind: Option<LogicalKind>,
        query: &MappingQuery,
    ) -> Result<TypeMapping, SqlMiddlewareDbError> {
        let store_type = store_type.trim();
        let parsed = parse_store_type(store_type)?;
        if self.is_disallowed_parsed(&parsed) {
            return Err(SqlMiddlewareDbError::DisallowedType {
                store_type: store_type.to_string(),
            });
        }

        let (candidates, exact) = match self.by_store_type.get(&normalize(store_type)) {
            Some(found) => (found.as_slice(), true),
            None => match self
                .by_store_type
                .get(&normalize(&parsed.name_without_facets()))
            {
                Some(found) => (found.as_slice(), false),
                None => (&[][..], false),
            },
        };

        let chosen = match kind {
            Some(kind) => pick_for_kind(candidates, kind, query.unicode),
            None => match candidates {
                [] => None,
                [only] => Some(only),
                _ => {
                    return Err(SqlMiddlewareDbError::AmbiguousType {
                        store_type: store_type.to_string(),
                    });
                }
            },
        };

        match chosen {
            Some(mapping) if exact => {
                trace!(store_type, kind = %mapping.kind(), "exact store type match");
                Ok(mapping.clone())
            }
            Some(mapping) => {
                trace!(store_type, base = %parsed.base, "store type matched by base name");
                Ok(specialize(mapping, store_type, &parsed, query))
            }
            None => match kind {
                Some(kind) => {
                    trace!(store_type, %kind, "unknown store type, resolving by kind");
                    let by_kind = self.resolve_kind(kind, query)?;
                    Ok(specialize(&by_kind, store_type, &parsed, query))
                }
                None => Err(SqlMiddlewareDbError::NoMapping(format!(
                    "store type '{store_type}'"
                ))),
            },
        }
    }

    fn resolve_kind(
        &self,
        kind: LogicalKind,
        query: &MappingQuery,
    ) -> Result<TypeMapping, SqlMiddlewareDbError> {
        match kind {
            LogicalKind::String => Ok(string_mapping(query)),
            LogicalKind::Binary => Ok(binary_mapping(query)),
            LogicalKind::Decimal if query.precision.is_some() => Ok(decimal_mapping(query)),
            _ => self
                .by_kind
                .get(&kind)
                .cloned()
                .ok_or_else(|| SqlMiddlewareDbError::NoMapping(format!("kind {kind}"))),
        }
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn pick_for_kind<'a>(
    candidates: &'a [TypeMapping],
    kind: LogicalKind,
    unicode: Option<bool>,
) -> Option<&'a TypeMapping> {
    let mut matching = candidates.iter().filter(|m| m.kind() == kind);
    match unicode {
        Some(unicode) if kind == LogicalKind::String => {
            let all: Vec<_> = matching.collect();
            all.iter()
                .find(|m| m.is_unicode() == unicode)
                .or_else(|| all.first())
                .copied()
        }
        _ => matching.next(),
    }
}

/// Clone `mapping` onto the caller's spelling, carrying the parsed facets.
fn specialize(
    mapping: &TypeMapping,
    store_type: &str,
    parsed: &ParsedStoreType,
    query: &MappingQuery,
) -> TypeMapping {
    if mapping.kind().is_sized() {
        let size = parsed.first.or(query.size).or(mapping.size());
        return mapping.clone_with_store_type(store_type, size);
    }
    let cloned = mapping.clone_with_store_type(store_type, mapping.size());
    match parsed.first.and_then(|p| u8::try_from(p).ok()) {
        Some(precision) => {
            cloned.with_precision_and_scale(precision, parsed.second.and_then(|s| u8::try_from(s).ok()))
        }
        None => cloned,
    }
}

fn row_version_mapping() -> TypeMapping {
    TypeMapping::builder(
        LogicalKind::Binary,
        format!("RAW({ROW_VERSION_SIZE})"),
        ProviderTypeTag::Raw,
    )
    .size(ROW_VERSION_SIZE)
    .fixed_length(true)
    .row_version(true)
    .build()
}

fn string_mapping(query: &MappingQuery) -> TypeMapping {
    let unicode = query.unicode.unwrap_or(true);
    let fixed = query.fixed_length.unwrap_or(false);
    let key = query.key_or_index.unwrap_or(false);
    let (max, key_size) = if unicode {
        (UNICODE_MAX_SIZE, UNICODE_KEY_SIZE)
    } else {
        (ANSI_MAX_SIZE, ANSI_KEY_SIZE)
    };
    let max = if fixed { max.min(FIXED_LENGTH_MAX_SIZE) } else { max };
    let size = query.size.unwrap_or(if key { key_size } else { max });

    let (store_type, tag) = if size > max {
        let name = if unicode { "NCLOB" } else { "CLOB" };
        let tag = if unicode { ProviderTypeTag::NClob } else { ProviderTypeTag::Clob };
        (name.to_string(), tag)
    } else {
        let (name, tag) = match (unicode, fixed) {
            (true, true) => ("NCHAR", ProviderTypeTag::NChar),
            (true, false) => ("NVARCHAR2", ProviderTypeTag::NVarchar2),
            (false, true) => ("CHAR", ProviderTypeTag::Char),
            (false, false) => ("VARCHAR2", ProviderTypeTag::Varchar2),
        };
        (format!("{name}({size})"), tag)
    };

    TypeMapping::builder(LogicalKind::String, store_type, tag)
        .size(size)
        .unicode(unicode)
        .fixed_length(fixed)
        .key_or_index(key)
        .build()
}

fn binary_mapping(query: &MappingQuery) -> TypeMapping {
    let fixed = query.fixed_length.unwrap_or(false);
    let key = query.key_or_index.unwrap_or(false);
    let size = query.size.or(key.then_some(BINARY_KEY_SIZE));

    let builder = match size {
        Some(size) if size <= BINARY_MAX_SIZE => {
            TypeMapping::builder(LogicalKind::Binary, format!("RAW({size})"), ProviderTypeTag::Raw)
                .size(size)
        }
        Some(size) => TypeMapping::builder(LogicalKind::Binary, "BLOB", ProviderTypeTag::Blob).size(size),
        None => TypeMapping::builder(LogicalKind::Binary, "BLOB", ProviderTypeTag::Blob),
    };
    builder.fixed_length(fixed).key_or_index(key).build()
}

fn decimal_mapping(query: &MappingQuery) -> TypeMapping {
    let precision = query.precision.unwrap_or(crate::mapping::DEFAULT_DECIMAL_PRECISION);
    let store_type = match query.scale {
        Some(scale) => format!("DECIMAL({precision},{scale})"),
        None => format!("DECIMAL({precision})"),
    };
    TypeMapping::builder(LogicalKind::Decimal, store_type, ProviderTypeTag::Decimal)
        .precision_and_scale(precision, query.scale)
        .build()
}
