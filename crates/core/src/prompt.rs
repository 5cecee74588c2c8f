//! Prompt rendering: tables as compact text and `$0` / `$1` substitution.

use crate::table::{Table, TableSnapshot};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([01])").unwrap());

/// System and user prompt after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Render every table in `snapshot`.
///
/// ```text
/// * 0:People
/// rowIndex,0:name,1:role
/// 0,Alice,hero
/// ```
pub fn render_tables(snapshot: &TableSnapshot) -> String {
    let mut out = String::new();
    for (index, table) in snapshot.tables.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_table(&mut out, index, table);
    }
    out
}

fn render_table(out: &mut String, index: usize, table: &Table) {
    out.push_str(&format!("* {index}:{}\n", table.name));
    if let Some(note) = table.note.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("note: {}\n", flatten(note)));
    }

    let header: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{i}:{}", flatten(name)))
        .collect();
    out.push_str(&format!("rowIndex,{}\n", header.join(",")));

    if table.rows.is_empty() {
        out.push_str("(empty)\n");
        return;
    }
    for (row_index, row) in table.rows.iter().enumerate() {
        let cells: Vec<String> = table
            .required_columns()
            .map(|column| row.get(column).map(flatten).unwrap_or_default())
            .collect();
        out.push_str(&format!("{row_index},{}\n", cells.join(",")));
    }
}

/// Keep every cell on one line.
fn flatten(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Substitute `$0` with `tables` and `$1` with `window` in a single pass, so
/// placeholder-like text inside the inserted content is left alone.
pub fn substitute(template: &str, tables: &str, window: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "0" => tables.to_string(),
            _ => window.to_string(),
        })
        .into_owned()
}

/// Render both prompt templates against the current tables and window text.
pub fn render_prompt(
    system_template: &str,
    user_template: &str,
    snapshot: &TableSnapshot,
    window: &str,
) -> RenderedPrompt {
    let tables = render_tables(snapshot);
    RenderedPrompt {
        system: substitute(system_template, &tables, window),
        user: substitute(user_template, &tables, window),
    }
}
