use anyhow::{Context, Result};
use std::path::Path;
use tablesync_core::{ChatStore, Table};
use tablesync_local_store::JsonlChatStore;

pub fn run_show(store_dir: &Path, chat_id: &str, json: bool) -> Result<()> {
    let store = JsonlChatStore::new(store_dir);
    let chat = store
        .load(chat_id)
        .with_context(|| format!("Failed to load chat `{chat_id}`"))?;
    let snapshot = chat.latest_snapshot();

    if json {
        let out = serde_json::to_string_pretty(snapshot).context("Failed to serialize tables")?;
        println!("{out}");
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("(no tables)");
        return Ok(());
    }
    for (index, table) in snapshot.tables.iter().enumerate() {
        if index > 0 {
            println!();
        }
        for line in format_table(index, table) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Column-aligned rendering with a leading row-index column.
fn format_table(index: usize, table: &Table) -> Vec<String> {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(table.rows.len() + 1);
    let mut header = vec!["#".to_string()];
    header.extend(table.columns.iter().cloned());
    grid.push(header);
    for (row_index, row) in table.rows.iter().enumerate() {
        let mut cells = vec![row_index.to_string()];
        cells.extend(
            table
                .required_columns()
                .map(|column| row.get(column).unwrap_or("").replace('\n', " ")),
        );
        grid.push(cells);
    }

    let widths: Vec<usize> = (0..grid[0].len())
        .map(|col| {
            grid.iter()
                .map(|cells| cells.get(col).map_or(0, |c| c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = vec![format!("* {index}:{} ({} rows)", table.name, table.rows.len())];
    for cells in &grid {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        lines.push(format!("  {}", padded.join(" | ").trim_end()));
    }
    lines
}
