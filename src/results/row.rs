use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One row of a [`super::ResultSet`].
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// Column names, shared across the result set
    pub column_names: Arc<Vec<String>>,
    /// Values in column order
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a standalone row with its own name lookup
    ///
    /// # Arguments
    ///
    /// * `column_names` - Names in column order
    /// * `rows` - Values in column order
    ///
    /// # Returns
    ///
    /// A `CustomDbRow` ready for lookups by name or index
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let cache = Arc::new(Self::index_of(&column_names));
        Self {
            column_names,
            rows,
            column_index_cache: cache,
        }
    }

    pub(crate) fn index_of(column_names: &[String]) -> HashMap<String, usize> {
        column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect()
    }

    /// Index of a column; exact match first, then case-insensitive
    ///
    /// # Arguments
    ///
    /// * `column_name` - The column to find
    ///
    /// # Returns
    ///
    /// The column's index, or `None` when no column matches
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        // the engine folds unquoted identifiers to upper case
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    /// Value of a column by name
    ///
    /// # Arguments
    ///
    /// * `column_name` - Matched as in [`CustomDbRow::get_column_index`]
    ///
    /// # Returns
    ///
    /// The value, or `None` when the column does not exist
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Value of a column by position
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let row = CustomDbRow::new(
            Arc::new(vec!["USER_NAME".into()]),
            vec![RowValues::Text("scott".into())],
        );
        assert_eq!(row.get("user_name"), Some(&RowValues::Text("scott".into())));
        assert_eq!(row.get("missing"), None);
    }
}
