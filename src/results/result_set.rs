use std::collections::HashMap;
use std::sync::Arc;

use super::row::CustomDbRow;
use crate::types::RowValues;

/// Rows drained from a reader.
///
/// Column names and the name-to-index lookup are shared by every row.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows read
    pub results: Vec<CustomDbRow>,
    /// Number of rows added so far
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create an empty result set with room for `capacity` rows
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of rows to preallocate
    ///
    /// # Returns
    ///
    /// An empty `ResultSet` with no column names yet
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names shared by all rows added afterwards
    ///
    /// # Arguments
    ///
    /// * `column_names` - Names in column order; the name lookup is built once here
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(CustomDbRow::index_of(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Column names, if set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row of values
    ///
    /// Values added before column names are set are ignored.
    ///
    /// # Arguments
    ///
    /// * `row_values` - Values in column order
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(column_index),
            });
            self.rows_affected += 1;
        }
    }

    /// Add a prebuilt row
    ///
    /// # Arguments
    ///
    /// * `row` - The row to add; its column names are adopted if none are set
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_names = Some(Arc::clone(&row.column_names));
            self.column_index = Some(Arc::clone(&row.column_index_cache));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
