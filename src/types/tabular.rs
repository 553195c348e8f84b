//! Tabular query results.

use crate::types::canonical::{CanonicalCell, Canonicalizer, ColumnPolicy};
use crate::types::error::{EvalError, Result};
use crate::types::value::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonicalized row, usable as a sort key.
pub type CanonicalRow = Vec<CanonicalCell>;

/// Result set of one executed query.
///
/// `rows[i][j]` is the value of column `columns[j]`. Column order is the
/// order returned by the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    /// Column names
    pub columns: Vec<String>,

    /// Rows aligned positionally to `columns`
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    /// Create result from columns and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// Create result with columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check that every row has exactly one cell per column.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ComparisonError` naming the first ragged row
    pub fn validate_shape(&self) -> Result<()> {
        let width = self.columns.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(EvalError::comparison(format!(
                    "row {} has {} cells but result has {} columns",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        Ok(())
    }

    /// Map each target column to a source column index by name.
    ///
    /// Names match case-insensitively; duplicate names are consumed in order.
    ///
    /// # Returns
    ///
    /// `Some(indices)` where `indices[k]` is the source column for
    /// `target_order[k]`, or `None` if the name multisets differ
    pub fn column_alignment(&self, target_order: &[String]) -> Option<Vec<usize>> {
        if target_order.len() != self.columns.len() {
            return None;
        }

        let mut available: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, name) in self.columns.iter().enumerate().rev() {
            available.entry(name.to_lowercase()).or_default().push(i);
        }

        target_order
            .iter()
            .map(|name| available.get_mut(&name.to_lowercase()).and_then(Vec::pop))
            .collect()
    }

    /// Reorder columns to match `target_order`.
    ///
    /// # Arguments
    ///
    /// * `target_order` - Desired column names (case-insensitive match)
    ///
    /// # Returns
    ///
    /// New result whose columns and cells follow `target_order`
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ComparisonError` if the column names do not
    /// match as a set, or a row is ragged
    pub fn reorder_columns(&self, target_order: &[String]) -> Result<TabularResult> {
        self.validate_shape()?;
        let alignment = self.column_alignment(target_order).ok_or_else(|| {
            EvalError::comparison(format!(
                "columns {:?} cannot be reordered to {:?}",
                self.columns, target_order
            ))
        })?;

        let columns = alignment.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| alignment.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(TabularResult { columns, rows })
    }

    /// Canonical row bag: every row canonicalized, then sorted.
    ///
    /// Two results hold the same multiset of rows iff their bags are equal.
    ///
    /// # Arguments
    ///
    /// * `policies` - One policy per column
    /// * `canonicalizer` - Numeric precision
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ComparisonError` if a row is ragged or the policy
    /// count does not match the column count
    pub fn to_canonical_row_bag(
        &self,
        policies: &[ColumnPolicy],
        canonicalizer: &Canonicalizer,
    ) -> Result<Vec<CanonicalRow>> {
        self.validate_shape()?;
        if policies.len() != self.columns.len() {
            return Err(EvalError::comparison(format!(
                "{} column policies for {} columns",
                policies.len(),
                self.columns.len()
            )));
        }

        let mut bag: Vec<CanonicalRow> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(policies)
                    .map(|(cell, policy)| canonicalizer.canonicalize(cell, *policy))
                    .collect()
            })
            .collect();
        bag.sort();

        Ok(bag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_reorder_columns() {
        let result = TabularResult::new(
            names(&["last_name", "First_Name"]),
            vec![vec!["Doe".into(), "Jane".into()]],
        );

        let reordered = result.reorder_columns(&names(&["first_name", "LAST_NAME"])).unwrap();

        assert_eq!(reordered.columns, names(&["First_Name", "last_name"]));
        assert_eq!(reordered.rows, vec![vec![CellValue::from("Jane"), CellValue::from("Doe")]]);
    }

    #[test]
    fn test_reorder_duplicate_names() {
        let result = TabularResult::new(
            names(&["count", "name", "count"]),
            vec![vec![1_i64.into(), "x".into(), 2_i64.into()]],
        );

        let reordered = result.reorder_columns(&names(&["name", "count", "count"])).unwrap();
        assert_eq!(
            reordered.rows[0],
            vec![CellValue::from("x"), CellValue::from(1_i64), CellValue::from(2_i64)]
        );
    }

    #[test]
    fn test_reorder_mismatched_names() {
        let result = TabularResult::empty(names(&["a", "b"]));

        assert!(result.column_alignment(&names(&["a", "c"])).is_none());
        assert!(result.column_alignment(&names(&["a"])).is_none());
        assert!(matches!(
            result.reorder_columns(&names(&["a", "c"])),
            Err(EvalError::ComparisonError(_))
        ));
    }

    #[test]
    fn test_validate_shape() {
        let ragged = TabularResult::new(names(&["a", "b"]), vec![vec![1_i64.into()]]);
        assert!(ragged.validate_shape().is_err());
        assert!(TabularResult::empty(names(&["a"])).validate_shape().is_ok());
    }

    #[test]
    fn test_canonical_bag_is_sorted() {
        let result = TabularResult::new(
            names(&["n"]),
            vec![vec![2_i64.into()], vec![CellValue::Null], vec![1_i64.into()]],
        );
        let bag = result
            .to_canonical_row_bag(&[ColumnPolicy::default()], &Canonicalizer::default())
            .unwrap();

        assert_eq!(bag[0], vec![CanonicalCell::Null]);
        assert_eq!(bag[1], vec![CanonicalCell::Number(1_000_000)]);
        assert_eq!(bag[2], vec![CanonicalCell::Number(2_000_000)]);
    }

    #[test]
    fn test_fixture_deserialize() {
        let result: TabularResult = serde_yaml::from_str(
            "columns: [company, avg_email_length]\nrows:\n  - ['Hart Group', 37.0]\n",
        )
        .unwrap();

        assert_eq!(result.column_count(), 2);
        assert_eq!(result.rows[0][1], CellValue::Float(37.0));
    }
}
