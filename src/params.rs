//! Parameter binding: in-memory values to native parameters.

use std::collections::HashMap;

use crate::driver::{NativeValue, ProviderTypeTag};
use crate::error::SqlMiddlewareDbError;
use crate::mapping::TypeMapping;
use crate::types::RowValues;

/// A parameter ready for the native command.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub value: NativeValue,
    /// `None` for kinds that are not sized, `Some(0)` for unbounded values
    pub size: Option<u32>,
    pub provider_type: ProviderTypeTag,
}

impl BoundParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: NativeValue, provider_type: ProviderTypeTag) -> Self {
        Self {
            name: name.into(),
            value,
            size: None,
            provider_type,
        }
    }
}

/// A parameter declared by a command: its placeholder name and the mapping used to bind it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandParameter {
    pub name: String,
    pub mapping: TypeMapping,
}

impl CommandParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, mapping: TypeMapping) -> Self {
        Self {
            name: name.into(),
            mapping,
        }
    }
}

/// Values supplied for one execution, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValues {
    values: HashMap<String, RowValues>,
}

impl ParameterValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: RowValues) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: RowValues) {
        self.values.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.values.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RowValues)> for ParameterValues {
    fn from_iter<T: IntoIterator<Item = (K, RowValues)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Bind one value through `mapping`: user converter, provider coercion, then sizing.
///
/// `None` means the caller supplied nothing for the parameter; pass
/// `Some(&RowValues::Null)` to bind an explicit NULL.
///
/// # Errors
/// Returns `SqlMiddlewareDbError::MissingParameterValue` when `value` is `None`.
pub fn bind_parameter(
    mapping: &TypeMapping,
    name: &str,
    value: Option<&RowValues>,
) -> Result<BoundParameter, SqlMiddlewareDbError> {
    let value = value.ok_or_else(|| SqlMiddlewareDbError::MissingParameterValue {
        name: name.to_string(),
    })?;
    let native = mapping.to_native(value);
    let mut parameter = BoundParameter::new(name, NativeValue::Null, mapping.provider_type());
    mapping.configure_parameter(&mut parameter, &native);
    parameter.value = native;
    Ok(parameter)
}

/// Bind every declared parameter, failing on the first one without a value.
///
/// # Errors
/// Returns the first binding error; nothing is partially bound.
pub fn bind_parameters(
    parameters: &[CommandParameter],
    values: &ParameterValues,
) -> Result<Vec<BoundParameter>, SqlMiddlewareDbError> {
    let mut bound = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        bound.push(bind_parameter(
            &parameter.mapping,
            &parameter.name,
            values.get(&parameter.name),
        )?);
    }
    Ok(bound)
}

/// Render bound parameters for diagnostics; values are masked unless `with_values`.
#[must_use]
pub fn render_parameters(parameters: &[BoundParameter], with_values: bool) -> String {
    parameters
        .iter()
        .map(|p| {
            if with_values {
                format!("{}={:?}", p.name, p.value)
            } else {
                format!("{}=?", p.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalKind;

    fn flag() -> TypeMapping {
        TypeMapping::builder(LogicalKind::Boolean, "NUMBER(1)", ProviderTypeTag::Int16)
            .precision_and_scale(1, None)
            .build()
    }

    #[test]
    fn missing_value_names_the_parameter() {
        let err = bind_parameter(&flag(), "active", None).unwrap_err();
        match err {
            SqlMiddlewareDbError::MissingParameterValue { name } => assert_eq!(name, "active"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn explicit_null_binds() {
        let bound = bind_parameter(&flag(), "active", Some(&RowValues::Null)).unwrap();
        assert_eq!(bound.value, NativeValue::Null);
        assert_eq!(bound.provider_type, ProviderTypeTag::Int16);
    }

    #[test]
    fn bind_parameters_stops_at_first_gap() {
        let declared = vec![
            CommandParameter::new("a", flag()),
            CommandParameter::new("b", flag()),
        ];
        let values = ParameterValues::new().with("a", RowValues::Bool(true));
        assert!(matches!(
            bind_parameters(&declared, &values),
            Err(SqlMiddlewareDbError::MissingParameterValue { .. })
        ));

        let values = values.with("b", RowValues::Bool(false));
        let bound = bind_parameters(&declared, &values).unwrap();
        assert_eq!(bound[0].value, NativeValue::Int(1));
        assert_eq!(bound[1].value, NativeValue::Int(0));
    }

    #[test]
    fn rendering_masks_values_by_default() {
        let bound = vec![BoundParameter::new("p", NativeValue::Int(9), ProviderTypeTag::Int64)];
        assert_eq!(render_parameters(&bound, false), "p=?");
        assert_eq!(render_parameters(&bound, true), "p=Int(9)");
    }
}
