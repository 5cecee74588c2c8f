use crate::action::{ActionKind, EditAction};
use crate::table::{Row, RowData, Table, TableSnapshot, TableStructure};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Table that stays editable by deletes even under delete protection.
pub const CORE_TABLE_INDEX: usize = 0;

/// Host policy for applying actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPolicy {
    /// Suppress deletes outside the core table.
    pub ignore_delete: bool,
}

/// A single action that was skipped. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApplyWarning {
    UnknownTable {
        action: ActionKind,
        table_index: usize,
    },
    RowNotFound {
        action: ActionKind,
        table_index: usize,
        row_index: usize,
    },
    EmptyKeyColumn {
        table_index: usize,
        row_index: usize,
    },
    IncompleteInsert {
        table_index: usize,
        missing: Vec<usize>,
    },
    DeleteSuppressed {
        table_index: usize,
        row_index: usize,
    },
}

impl fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTable {
                action,
                table_index,
            } => write!(f, "{action} skipped: table {table_index} does not exist"),
            Self::RowNotFound {
                action,
                table_index,
                row_index,
            } => write!(
                f,
                "{action} skipped: table {table_index} has no row {row_index}"
            ),
            Self::EmptyKeyColumn {
                table_index,
                row_index,
            } => write!(
                f,
                "update skipped: row {row_index} of table {table_index} has an empty key column"
            ),
            Self::IncompleteInsert {
                table_index,
                missing,
            } => {
                let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "insert into table {table_index} rejected: missing columns {}",
                    missing.join(", ")
                )
            }
            Self::DeleteSuppressed {
                table_index,
                row_index,
            } => write!(
                f,
                "delete of row {row_index} in table {table_index} suppressed by delete protection"
            ),
        }
    }
}

/// Outcome of applying one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<EditAction>,
    pub warnings: Vec<ApplyWarning>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn suppressed_deletes(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, ApplyWarning::DeleteSuppressed { .. }))
            .count()
    }
}

/// Apply `actions` in order to `snapshot`.
///
/// Each action either lands completely or is skipped with a warning; earlier
/// actions are never rolled back. Row indices are resolved against the
/// snapshot as it stands when each action runs.
pub fn apply_actions(
    snapshot: &mut TableSnapshot,
    actions: &[EditAction],
    policy: &ApplyPolicy,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for action in actions {
        match apply_one(snapshot, action, policy) {
            Ok(()) => {
                debug!(%action, "applied");
                report.applied.push(action.clone());
            }
            Err(warning) => {
                warn!(%action, "{warning}");
                report.warnings.push(warning);
            }
        }
    }
    report
}

fn apply_one(
    snapshot: &mut TableSnapshot,
    action: &EditAction,
    policy: &ApplyPolicy,
) -> Result<(), ApplyWarning> {
    let table_index = action.table_index();
    let unknown = || ApplyWarning::UnknownTable {
        action: action.kind(),
        table_index,
    };
    let required = snapshot
        .required_columns(table_index)
        .ok_or_else(unknown)?;
    let table = snapshot.get_mut(table_index).ok_or_else(unknown)?;

    match action {
        EditAction::Update {
            row_index, data, ..
        } => apply_update(table, table_index, *row_index, data),
        EditAction::Insert { data, .. } => apply_insert(table, table_index, &required, data),
        EditAction::Delete { row_index, .. } => {
            apply_delete(table, table_index, *row_index, policy)
        }
    }
}

fn apply_update(
    table: &mut Table,
    table_index: usize,
    row_index: usize,
    data: &RowData,
) -> Result<(), ApplyWarning> {
    let known = table.required_columns();
    let row = table
        .rows
        .get_mut(row_index)
        .ok_or(ApplyWarning::RowNotFound {
            action: ActionKind::Update,
            table_index,
            row_index,
        })?;

    if !row.has_key() {
        return Err(ApplyWarning::EmptyKeyColumn {
            table_index,
            row_index,
        });
    }

    row.merge(&known_columns(data, &known));
    Ok(())
}

fn apply_insert(
    table: &mut Table,
    table_index: usize,
    required: &[usize],
    data: &RowData,
) -> Result<(), ApplyWarning> {
    let missing: Vec<usize> = required
        .iter()
        .copied()
        .filter(|column| !data.contains_key(column))
        .collect();
    if !missing.is_empty() {
        return Err(ApplyWarning::IncompleteInsert {
            table_index,
            missing,
        });
    }

    let row = Row::new(known_columns(data, &table.required_columns()));
    table.rows.push(row);
    Ok(())
}

fn apply_delete(
    table: &mut Table,
    table_index: usize,
    row_index: usize,
    policy: &ApplyPolicy,
) -> Result<(), ApplyWarning> {
    if table_index != CORE_TABLE_INDEX && policy.ignore_delete {
        return Err(ApplyWarning::DeleteSuppressed {
            table_index,
            row_index,
        });
    }
    if row_index >= table.rows.len() {
        return Err(ApplyWarning::RowNotFound {
            action: ActionKind::Delete,
            table_index,
            row_index,
        });
    }
    table.rows.remove(row_index);
    Ok(())
}

/// Keep only cells that address a column of the table.
fn known_columns(data: &RowData, known: &std::ops::Range<usize>) -> RowData {
    let (kept, dropped): (RowData, RowData) = data
        .iter()
        .map(|(k, v)| (*k, v.clone()))
        .partition(|(k, _)| known.contains(k));
    if !dropped.is_empty() {
        debug!(
            columns = ?dropped.keys().collect::<Vec<_>>(),
            "ignoring cells outside the table's columns"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::dedup_and_order;

    fn data(cells: &[(usize, &str)]) -> RowData {
        cells.iter().map(|(k, v)| (*k, (*v).to_string())).collect()
    }

    fn people(rows: usize) -> Table {
        Table::new("People", &["name", "role"]).with_rows(
            (0..rows)
                .map(|i| {
                    let name = format!("p{i}");
                    Row::new(data(&[(0, name.as_str()), (1, "r")]))
                })
                .collect(),
        )
    }

    fn snapshot() -> TableSnapshot {
        TableSnapshot::new(vec![
            Table::new("Facts", &["fact"]).with_rows(vec![
                Row::from([(0, "a")]),
                Row::from([(0, "b")]),
            ]),
            people(3),
        ])
    }

    #[test]
    fn test_incomplete_insert_is_rejected() {
        let mut snap = snapshot();
        let before = snap.clone();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Insert {
                table_index: 1,
                data: data(&[(0, "a")]),
            }],
            &ApplyPolicy::default(),
        );
        assert_eq!(snap, before);
        assert_eq!(
            report.warnings,
            vec![ApplyWarning::IncompleteInsert {
                table_index: 1,
                missing: vec![1]
            }]
        );
        assert!(report.applied.is_empty());
    }

    #[test]
    fn test_complete_insert_appends_row() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Insert {
                table_index: 1,
                data: data(&[(0, "Zed"), (1, "bard"), (9, "stray")]),
            }],
            &ApplyPolicy::default(),
        );
        assert!(report.is_clean());
        let people = snap.get(1).unwrap();
        assert_eq!(people.rows.len(), 4);
        assert_eq!(people.rows[3], Row::from([(0, "Zed"), (1, "bard")]));
    }

    #[test]
    fn test_update_on_empty_key_row_is_noop() {
        let mut snap = snapshot();
        snap.get_mut(1).unwrap().rows[0] = Row::from([(0, ""), (1, "ghost")]);
        let before = snap.clone();

        let report = apply_actions(
            &mut snap,
            &[EditAction::Update {
                table_index: 1,
                row_index: 0,
                data: data(&[(1, "filled")]),
            }],
            &ApplyPolicy::default(),
        );
        assert_eq!(snap, before);
        assert_eq!(
            report.warnings,
            vec![ApplyWarning::EmptyKeyColumn {
                table_index: 1,
                row_index: 0
            }]
        );
    }

    #[test]
    fn test_update_overwrites_only_targeted_keys() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Update {
                table_index: 1,
                row_index: 1,
                data: data(&[(1, "captain")]),
            }],
            &ApplyPolicy::default(),
        );
        assert!(report.is_clean());
        assert_eq!(
            snap.get(1).unwrap().rows[1],
            Row::from([(0, "p1"), (1, "captain")])
        );
    }

    #[test]
    fn test_update_missing_row_warns() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Update {
                table_index: 1,
                row_index: 10,
                data: data(&[(1, "x")]),
            }],
            &ApplyPolicy::default(),
        );
        assert!(matches!(
            report.warnings[0],
            ApplyWarning::RowNotFound { row_index: 10, .. }
        ));
    }

    #[test]
    fn test_delete_on_core_table_ignores_protection() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Delete {
                table_index: 0,
                row_index: 0,
            }],
            &ApplyPolicy {
                ignore_delete: true,
            },
        );
        assert!(report.is_clean());
        assert_eq!(snap.get(0).unwrap().rows, vec![Row::from([(0, "b")])]);
    }

    #[test]
    fn test_delete_elsewhere_is_suppressed_under_protection() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[EditAction::Delete {
                table_index: 1,
                row_index: 0,
            }],
            &ApplyPolicy {
                ignore_delete: true,
            },
        );
        assert_eq!(snap.get(1).unwrap().rows.len(), 3);
        assert_eq!(report.suppressed_deletes(), 1);
    }

    #[test]
    fn test_delete_without_protection_removes_row() {
        let mut snap = snapshot();
        apply_actions(
            &mut snap,
            &[EditAction::Delete {
                table_index: 1,
                row_index: 2,
            }],
            &ApplyPolicy::default(),
        );
        assert_eq!(snap.get(1).unwrap().rows.len(), 2);
    }

    #[test]
    fn test_unknown_table_is_isolated() {
        let mut snap = snapshot();
        let report = apply_actions(
            &mut snap,
            &[
                EditAction::Delete {
                    table_index: 7,
                    row_index: 0,
                },
                EditAction::Insert {
                    table_index: 0,
                    data: data(&[(0, "c")]),
                },
            ],
            &ApplyPolicy::default(),
        );
        assert_eq!(report.applied.len(), 1);
        assert_eq!(
            report.warnings,
            vec![ApplyWarning::UnknownTable {
                action: ActionKind::Delete,
                table_index: 7
            }]
        );
        assert_eq!(snap.get(0).unwrap().rows.len(), 3);
    }

    #[test]
    fn test_ordered_deletes_leave_expected_rows() {
        let mut snap = TableSnapshot::new(vec![Table::new("Facts", &["fact"]), people(6)]);
        let actions = [1, 3, 5]
            .into_iter()
            .map(|row_index| EditAction::Delete {
                table_index: 1,
                row_index,
            })
            .collect();
        let ordered = dedup_and_order(actions, &snap);
        let report = apply_actions(&mut snap, &ordered, &ApplyPolicy::default());

        assert!(report.is_clean());
        let names: Vec<&str> = snap
            .get(1)
            .unwrap()
            .rows
            .iter()
            .map(|r| r.get(0).unwrap())
            .collect();
        assert_eq!(names, vec!["p0", "p2", "p4"]);
    }

    #[test]
    fn test_duplicate_insert_batch_yields_one_row() {
        let mut snap = TableSnapshot::new(vec![Table::new("Facts", &["fact"]), people(0)]);
        let actions = vec![
            EditAction::Insert {
                table_index: 1,
                data: data(&[(0, "x"), (1, "y")]),
            },
            EditAction::Insert {
                table_index: 1,
                data: data(&[(0, "x"), (1, "y")]),
            },
        ];
        let ordered = dedup_and_order(actions, &snap);
        apply_actions(&mut snap, &ordered, &ApplyPolicy::default());
        assert_eq!(snap.get(1).unwrap().rows, vec![Row::from([(0, "x"), (1, "y")])]);
    }
}
