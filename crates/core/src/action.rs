use crate::table::RowData;
use serde::Serialize;
use std::fmt;

/// One proposed row edit against a [`crate::TableSnapshot`].
///
/// Decoded once by [`crate::validate::validate_actions`]; the rest of the
/// pipeline matches on the variant instead of re-reading the `action` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Insert {
        table_index: usize,
        data: RowData,
    },
    Update {
        table_index: usize,
        /// Position of the row at validation time, not a stable identifier.
        row_index: usize,
        data: RowData,
    },
    Delete {
        table_index: usize,
        row_index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EditAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Insert { .. } => ActionKind::Insert,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    pub fn table_index(&self) -> usize {
        match self {
            Self::Insert { table_index, .. }
            | Self::Update { table_index, .. }
            | Self::Delete { table_index, .. } => *table_index,
        }
    }

    pub fn row_index(&self) -> Option<usize> {
        match self {
            Self::Insert { .. } => None,
            Self::Update { row_index, .. } | Self::Delete { row_index, .. } => Some(*row_index),
        }
    }

    pub fn data(&self) -> Option<&RowData> {
        match self {
            Self::Insert { data, .. } | Self::Update { data, .. } => Some(data),
            Self::Delete { .. } => None,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    /// Wire-format view (`action`/`tableIndex`/`rowIndex`/`data`).
    pub fn to_wire(&self) -> WireAction<'_> {
        WireAction {
            action: self.kind(),
            table_index: self.table_index(),
            row_index: self.row_index(),
            data: self.data(),
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row_index() {
            Some(row) => write!(f, "{} table {} row {}", self.kind(), self.table_index(), row)?,
            None => write!(f, "{} table {}", self.kind(), self.table_index())?,
        }
        if let Some(data) = self.data() {
            let cells: Vec<String> = data.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

/// Serializable form matching the provider's action-list format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAction<'a> {
    pub action: ActionKind,
    pub table_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a RowData>,
}
