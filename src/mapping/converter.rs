use std::sync::Arc;

use crate::types::RowValues;

type ConvertFn = Arc<dyn Fn(&RowValues) -> RowValues + Send + Sync>;

/// A pure, total, bidirectional conversion applied before provider coercion.
///
/// ```rust
/// use sql_middleware_oracle::prelude::*;
///
/// // Store booleans as 'Y' / 'N'
/// let yes_no = ValueConverter::new(
///     "yes_no",
///     |v| match v {
///         RowValues::Bool(b) => RowValues::Text(if *b { "Y" } else { "N" }.into()),
///         other => other.clone(),
///     },
///     |v| match v {
///         RowValues::Text(s) => RowValues::Bool(s == "Y"),
///         other => other.clone(),
///     },
/// );
/// assert_eq!(yes_no.to_provider(&RowValues::Bool(true)), RowValues::Text("Y".into()));
/// ```
#[derive(Clone)]
pub struct ValueConverter {
    name: String,
    to_provider: ConvertFn,
    from_provider: ConvertFn,
}

impl ValueConverter {
    pub fn new(
        name: impl Into<String>,
        to_provider: impl Fn(&RowValues) -> RowValues + Send + Sync + 'static,
        from_provider: impl Fn(&RowValues) -> RowValues + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            to_provider: Arc::new(to_provider),
            from_provider: Arc::new(from_provider),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn to_provider(&self, value: &RowValues) -> RowValues {
        (self.to_provider)(value)
    }

    #[must_use]
    pub fn from_provider(&self, value: &RowValues) -> RowValues {
        (self.from_provider)(value)
    }

    /// Wrap `self` with `outer`: `outer` runs after `self` towards the provider
    /// and before it on the way back.
    #[must_use]
    pub fn compose(&self, outer: &ValueConverter) -> ValueConverter {
        let inner_to = Arc::clone(&self.to_provider);
        let outer_to = Arc::clone(&outer.to_provider);
        let inner_from = Arc::clone(&self.from_provider);
        let outer_from = Arc::clone(&outer.from_provider);
        ValueConverter {
            name: format!("{}+{}", self.name, outer.name),
            to_provider: Arc::new(move |v| outer_to(&inner_to(v))),
            from_provider: Arc::new(move |v| inner_from(&outer_from(v))),
        }
    }

    /// Converters are compared by identity.
    #[must_use]
    pub fn ptr_eq(&self, other: &ValueConverter) -> bool {
        Arc::ptr_eq(&self.to_provider, &other.to_provider)
            && Arc::ptr_eq(&self.from_provider, &other.from_provider)
    }
}

impl std::fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueConverter").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(n: i64) -> ValueConverter {
        ValueConverter::new(
            format!("add{n}"),
            move |v| match v {
                RowValues::Int(i) => RowValues::Int(i + n),
                other => other.clone(),
            },
            move |v| match v {
                RowValues::Int(i) => RowValues::Int(i - n),
                other => other.clone(),
            },
        )
    }

    fn double() -> ValueConverter {
        ValueConverter::new(
            "double",
            |v| match v {
                RowValues::Int(i) => RowValues::Int(i * 2),
                other => other.clone(),
            },
            |v| match v {
                RowValues::Int(i) => RowValues::Int(i / 2),
                other => other.clone(),
            },
        )
    }

    #[test]
    fn compose_wraps_inner_converter() {
        let composed = add(1).compose(&double());
        // (3 + 1) * 2
        assert_eq!(composed.to_provider(&RowValues::Int(3)), RowValues::Int(8));
        assert_eq!(composed.from_provider(&RowValues::Int(8)), RowValues::Int(3));
        assert_eq!(composed.name(), "add1+double");
    }

    #[test]
    fn clones_share_identity() {
        let c = add(2);
        let same = c.clone();
        assert!(c.ptr_eq(&same));
        assert!(!c.ptr_eq(&add(2)));
    }
}
