use crate::action::EditAction;
use crate::table::TableSnapshot;
use std::collections::HashSet;
use tracing::debug;

/// Drop duplicate and no-op actions and put the rest in a single-pass-safe
/// order: every non-delete (original order) before every delete (descending
/// `row_index`).
pub fn dedup_and_order(actions: Vec<EditAction>, snapshot: &TableSnapshot) -> Vec<EditAction> {
    let (deletes, non_deletes): (Vec<_>, Vec<_>) =
        actions.into_iter().partition(EditAction::is_delete);

    let mut ordered = dedup_non_deletes(non_deletes, snapshot);
    ordered.extend(order_deletes(deletes));
    ordered
}

fn dedup_non_deletes(actions: Vec<EditAction>, snapshot: &TableSnapshot) -> Vec<EditAction> {
    let mut kept: Vec<EditAction> = Vec::with_capacity(actions.len());

    for action in actions {
        let duplicate = match &action {
            EditAction::Insert { table_index, data } => {
                let already_in_table = snapshot
                    .get(*table_index)
                    .is_some_and(|table| table.contains_row_data(data));
                already_in_table || kept.contains(&action)
            }
            EditAction::Update { .. } => kept.contains(&action),
            EditAction::Delete { .. } => false,
        };

        if duplicate {
            debug!(%action, "dropping duplicate action");
        } else {
            kept.push(action);
        }
    }
    kept
}

fn order_deletes(actions: Vec<EditAction>) -> Vec<EditAction> {
    let mut seen = HashSet::new();
    let mut kept: Vec<EditAction> = actions
        .into_iter()
        .filter(|action| {
            let first = seen.insert((action.table_index(), action.row_index()));
            if !first {
                debug!(%action, "dropping repeated delete");
            }
            first
        })
        .collect();

    kept.sort_by(|a, b| b.row_index().cmp(&a.row_index()));
    kept
}
