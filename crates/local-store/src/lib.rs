//! One `<chat_id>.jsonl` file per chat under a root directory.
//!
//! Saves go through a temp file in the same directory and a rename, so a
//! crash mid-write leaves the previous version intact.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tablesync_core::jsonl::{read_jsonl, write_jsonl};
use tablesync_core::store::validate_chat_id;
use tablesync_core::{Chat, ChatStore, StoreError};
use tracing::debug;

pub const CHAT_FILE_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct JsonlChatStore {
    root: PathBuf,
}

impl JsonlChatStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, chat_id: &str) -> Result<PathBuf, StoreError> {
        validate_chat_id(chat_id)?;
        Ok(self.root.join(format!("{chat_id}.{CHAT_FILE_EXTENSION}")))
    }

    pub fn exists(&self, chat_id: &str) -> bool {
        self.path_for(chat_id).is_ok_and(|p| p.is_file())
    }

    /// Ids of all stored chats, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHAT_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ChatStore for JsonlChatStore {
    fn load(&self, chat_id: &str) -> Result<Chat, StoreError> {
        let path = self.path_for(chat_id)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(chat_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut chat = read_jsonl(BufReader::new(file))?;
        if chat.chat_id != chat_id {
            debug!(file_id = chat_id, header_id = %chat.chat_id, "chat id follows file name");
            chat.chat_id = chat_id.to_string();
        }
        Ok(chat)
    }

    fn save(&self, chat: &Chat) -> Result<(), StoreError> {
        let path = self.path_for(&chat.chat_id)?;
        fs::create_dir_all(&self.root)?;

        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            write_jsonl(chat, &mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), turns = chat.turns.len(), "saved chat");
        Ok(())
    }
}
