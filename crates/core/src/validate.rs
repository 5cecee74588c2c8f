use crate::action::{ActionKind, EditAction};
use crate::table::RowData;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("action list must be an array, got {found}")]
    NotAnArray { found: &'static str },
    #[error("action {index} must be an object, got {found}")]
    NotAnObject { index: usize, found: &'static str },
    #[error("action {index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("action {index}: unknown action `{value}`, expected insert, update or delete")]
    UnknownAction { index: usize, value: String },
    #[error("action {index}: field `{field}` must be a non-negative integer, got {value}")]
    NotAnIndex {
        index: usize,
        field: &'static str,
        value: String,
    },
    #[error("action {index}: field `data` must be an object, got {found}")]
    DataNotAnObject { index: usize, found: &'static str },
    #[error("action {index}: data key `{key}` is not a column index")]
    InvalidColumnKey { index: usize, key: String },
    #[error("action {index}: data value for column {key} must be a string, got {found}")]
    InvalidCellValue {
        index: usize,
        key: String,
        found: &'static str,
    },
}

/// Validate a parsed action list and decode it into typed actions.
///
/// The whole batch is rejected on the first malformed element.
pub fn validate_actions(value: &Value) -> Result<Vec<EditAction>, SchemaError> {
    let items = value.as_array().ok_or(SchemaError::NotAnArray {
        found: value_kind(value),
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_action(index, item))
        .collect()
}

/// Validate a single element of the action list.
pub fn validate_action(index: usize, item: &Value) -> Result<EditAction, SchemaError> {
    let record = item.as_object().ok_or(SchemaError::NotAnObject {
        index,
        found: value_kind(item),
    })?;

    let kind = match record.get("action") {
        None | Some(Value::Null) => {
            return Err(SchemaError::MissingField {
                index,
                field: "action",
            });
        }
        Some(Value::String(raw)) => {
            ActionKind::parse(raw).ok_or_else(|| SchemaError::UnknownAction {
                index,
                value: raw.clone(),
            })?
        }
        Some(other) => {
            return Err(SchemaError::UnknownAction {
                index,
                value: other.to_string(),
            });
        }
    };

    let table_index = required_index(index, record, "tableIndex")?;
    let data = match record.get("data") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(decode_data(index, raw)?),
    };

    let action = match kind {
        ActionKind::Insert => EditAction::Insert {
            table_index,
            data: data.unwrap_or_default(),
        },
        ActionKind::Update => EditAction::Update {
            table_index,
            row_index: required_index(index, record, "rowIndex")?,
            data: data.unwrap_or_default(),
        },
        ActionKind::Delete => EditAction::Delete {
            table_index,
            row_index: required_index(index, record, "rowIndex")?,
        },
    };
    Ok(action)
}

fn required_index(
    index: usize,
    record: &Map<String, Value>,
    field: &'static str,
) -> Result<usize, SchemaError> {
    let value = match record.get(field) {
        None | Some(Value::Null) => return Err(SchemaError::MissingField { index, field }),
        Some(value) => value,
    };

    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| SchemaError::NotAnIndex {
            index,
            field,
            value: value.to_string(),
        })
}

fn decode_data(index: usize, raw: &Value) -> Result<RowData, SchemaError> {
    let object = raw.as_object().ok_or(SchemaError::DataNotAnObject {
        index,
        found: value_kind(raw),
    })?;

    let mut data = RowData::new();
    for (key, value) in object {
        let column = parse_column_key(key).ok_or_else(|| SchemaError::InvalidColumnKey {
            index,
            key: key.clone(),
        })?;
        let cell = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(SchemaError::InvalidCellValue {
                    index,
                    key: key.clone(),
                    found: value_kind(other),
                });
            }
        };
        data.insert(column, cell);
    }
    Ok(data)
}

/// Column keys are one or more ASCII digits.
fn parse_column_key(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
