use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column index → cell value, as carried by insert/update actions.
pub type RowData = BTreeMap<usize, String>;

/// Column that identifies a row. A row whose key column is empty is treated as
/// uncommitted scaffolding.
pub const KEY_COLUMN: usize = 0;

/// A single table row: a sparse mapping from column index to value.
///
/// Serialized as a JSON object with stringified column indices
/// (`{"0":"Alice","1":"hero"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub cells: RowData,
}

impl Row {
    pub fn new(cells: RowData) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.cells.get(&column).map(String::as_str)
    }

    /// Whether the key column holds a non-blank value.
    pub fn has_key(&self) -> bool {
        self.get(KEY_COLUMN).is_some_and(|v| !v.trim().is_empty())
    }

    /// Overwrite only the given columns, leaving the others untouched.
    pub fn merge(&mut self, data: &RowData) {
        for (column, value) in data {
            self.cells.insert(*column, value.clone());
        }
    }
}

impl<const N: usize> From<[(usize, &str); N]> for Row {
    fn from(cells: [(usize, &str); N]) -> Self {
        Self {
            cells: cells
                .into_iter()
                .map(|(column, value)| (column, value.to_string()))
                .collect(),
        }
    }
}

/// One tracked table: column structure plus ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Column headers. Every index in `0..columns.len()` is a required slot.
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Free-form guidance rendered next to the table in prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
            note: None,
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn required_columns(&self) -> std::ops::Range<usize> {
        0..self.columns.len()
    }

    pub fn contains_row_data(&self, data: &RowData) -> bool {
        self.rows.iter().any(|row| &row.cells == data)
    }
}

/// The full set of tables as of one conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSnapshot {
    pub tables: Vec<Table>,
}

impl TableSnapshot {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn get(&self, table_index: usize) -> Option<&Table> {
        self.tables.get(table_index)
    }

    pub fn get_mut(&mut self, table_index: usize) -> Option<&mut Table> {
        self.tables.get_mut(table_index)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// Source of column structure for a table index.
pub trait TableStructure {
    /// Ordered list of required column indices, or `None` for an unknown table.
    fn required_columns(&self, table_index: usize) -> Option<Vec<usize>>;
}

impl TableStructure for TableSnapshot {
    fn required_columns(&self, table_index: usize) -> Option<Vec<usize>> {
        self.get(table_index)
            .map(|table| table.required_columns().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_with_string_keys() {
        let row = Row::from([(0, "Alice"), (1, "hero")]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"0":"Alice","1":"hero"}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_has_key_ignores_blank_values() {
        assert!(Row::from([(0, "x")]).has_key());
        assert!(!Row::from([(0, "  ")]).has_key());
        assert!(!Row::from([(1, "x")]).has_key());
    }

    #[test]
    fn test_merge_overwrites_only_given_columns() {
        let mut row = Row::from([(0, "Alice"), (1, "hero"), (2, "castle")]);
        row.merge(&RowData::from([(1, "villain".to_string())]));
        assert_eq!(row, Row::from([(0, "Alice"), (1, "villain"), (2, "castle")]));
    }

    #[test]
    fn test_snapshot_reports_required_columns() {
        let snapshot = TableSnapshot::new(vec![Table::new("People", &["name", "role"])]);
        assert_eq!(snapshot.required_columns(0), Some(vec![0, 1]));
        assert_eq!(snapshot.required_columns(3), None);
    }

    #[test]
    fn test_table_defaults_rows_when_missing() {
        let table: Table = serde_json::from_str(r#"{"name":"Log","columns":["when"]}"#).unwrap();
        assert!(table.rows.is_empty());
        assert!(table.note.is_none());
    }
}
