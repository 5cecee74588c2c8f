//! Chat JSONL format
//!
//! A chat file has the structure:
//! ```jsonl
//! {"type":"header","version":"tablesync-1","chat_id":"...","templates":[...]}
//! {"type":"turn","uid":"...","is_user":true,"mes":"..."}
//! {"type":"turn","uid":"...","is_user":false,"mes":"...","tables":[...]}
//! ```
//!
//! The header carries the chat id and table templates. Each turn is one line.

use crate::chat::{Chat, ConversationTurn};
use crate::table::TableSnapshot;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

pub const FORMAT_VERSION: &str = "tablesync-1";

/// A single line in a chat JSONL file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum ChatLine {
    #[serde(rename = "header")]
    Header {
        version: String,
        chat_id: String,
        #[serde(default)]
        templates: TableSnapshot,
    },
    #[serde(rename = "turn")]
    Turn(ConversationTurn),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Missing header line")]
    MissingHeader,
    #[error("Unexpected line type at line {0}: expected header")]
    UnexpectedLineType(usize),
}

/// Write a chat as JSONL
pub fn write_jsonl<W: Write>(chat: &Chat, mut writer: W) -> Result<(), JsonlError> {
    let header = ChatLine::Header {
        version: FORMAT_VERSION.to_string(),
        chat_id: chat.chat_id.clone(),
        templates: chat.templates.clone(),
    };
    serde_json::to_writer(&mut writer, &header)
        .map_err(|e| JsonlError::Json { line: 1, source: e })?;
    writer.write_all(b"\n")?;

    for (i, turn) in chat.turns.iter().enumerate() {
        let line = ChatLine::Turn(turn.clone());
        serde_json::to_writer(&mut writer, &line).map_err(|e| JsonlError::Json {
            line: i + 2,
            source: e,
        })?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

pub fn to_jsonl_string(chat: &Chat) -> Result<String, JsonlError> {
    let mut buf = Vec::new();
    write_jsonl(chat, &mut buf)?;
    String::from_utf8(buf).map_err(|e| JsonlError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Read a chat from JSONL. Blank lines are skipped and repeated headers ignored.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Chat, JsonlError> {
    let mut lines = reader.lines();

    let header_str = lines.next().ok_or(JsonlError::MissingHeader)??;
    let header: ChatLine =
        serde_json::from_str(&header_str).map_err(|e| JsonlError::Json { line: 1, source: e })?;
    let (chat_id, templates) = match header {
        ChatLine::Header {
            chat_id, templates, ..
        } => (chat_id, templates),
        ChatLine::Turn(_) => return Err(JsonlError::UnexpectedLineType(1)),
    };

    let mut turns = Vec::new();
    for (offset, line_result) in lines.enumerate() {
        let line_num = offset + 2;
        let line_str = line_result?;
        if line_str.trim().is_empty() {
            continue;
        }
        let line: ChatLine = serde_json::from_str(&line_str).map_err(|e| JsonlError::Json {
            line: line_num,
            source: e,
        })?;
        match line {
            ChatLine::Turn(turn) => turns.push(turn),
            ChatLine::Header { .. } => {}
        }
    }

    Ok(Chat {
        chat_id,
        templates,
        turns,
    })
}

pub fn from_jsonl_str(s: &str) -> Result<Chat, JsonlError> {
    read_jsonl(io::BufReader::new(s.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Row, Table};

    fn make_test_chat() -> Chat {
        let templates = TableSnapshot::new(vec![Table::new("People", &["name", "role"])]);
        let mut chat = Chat::new("chat-jsonl-1", templates);
        chat.turns.push(ConversationTurn::user("Who is here?"));
        chat.turns.push(ConversationTurn::assistant("Alice, the hero."));
        chat.attach_snapshot(TableSnapshot::new(vec![
            Table::new("People", &["name", "role"])
                .with_rows(vec![Row::from([(0, "Alice"), (1, "hero")])]),
        ]));
        chat
    }

    #[test]
    fn test_jsonl_layout_and_read_back() {
        let chat = make_test_chat();
        let jsonl = to_jsonl_string(&chat).unwrap();

        let lines: Vec<&str> = jsonl.trim().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"type\":\"header\""));
        assert!(lines[0].contains(FORMAT_VERSION));
        assert!(lines[1].contains("\"type\":\"turn\""));
        assert!(lines[2].contains("\"tables\""));

        let parsed = from_jsonl_str(&jsonl).unwrap();
        assert_eq!(parsed, chat);
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(from_jsonl_str(""), Err(JsonlError::MissingHeader)));
    }

    #[test]
    fn test_turn_as_first_line_is_rejected() {
        let err = from_jsonl_str("{\"type\":\"turn\",\"mes\":\"hi\"}\n").unwrap_err();
        assert!(matches!(err, JsonlError::UnexpectedLineType(1)));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let text = "{\"type\":\"header\",\"version\":\"tablesync-1\",\"chat_id\":\"c\"}\n\n{oops}\n";
        let err = from_jsonl_str(text).unwrap_err();
        assert!(matches!(err, JsonlError::Json { line: 3, .. }));
    }
}
