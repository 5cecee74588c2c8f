use crate::chat::{Chat, ConversationTurn};
use crate::store::{ChatStore, StoreError};
use crate::table::{Row, Table, TableSnapshot};
use crate::window::ensure_initialized;
use std::collections::HashMap;
use std::sync::Mutex;

/// Two tables: `Facts` (one seed row) and an empty `People(name, role)`.
pub fn templates() -> TableSnapshot {
    TableSnapshot::new(vec![
        Table::new("Facts", &["fact"]).with_rows(vec![Row::from([(0, "sky is blue")])]),
        Table::new("People", &["name", "role"]),
    ])
}

/// Chat over [`templates`] with alternating user/assistant turns, uids
/// already assigned.
pub fn chat(messages: &[&str]) -> Chat {
    let mut chat = Chat::new(format!("test-{}", next_id()), templates());
    for (i, mes) in messages.iter().enumerate() {
        let turn = if i % 2 == 0 {
            ConversationTurn::user(*mes)
        } else {
            ConversationTurn::assistant(*mes)
        };
        chat.turns.push(turn);
    }
    ensure_initialized(&mut chat.turns);
    chat
}

/// In-memory [`ChatStore`] that counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chats: Mutex<HashMap<String, Chat>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_chat(chat: Chat) -> Self {
        let store = Self::default();
        if let Ok(mut chats) = store.chats.lock() {
            chats.insert(chat.chat_id.clone(), chat);
        }
        store
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl ChatStore for MemoryStore {
    fn load(&self, chat_id: &str) -> Result<Chat, StoreError> {
        self.chats
            .lock()
            .ok()
            .and_then(|chats| chats.get(chat_id).cloned())
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))
    }

    fn save(&self, chat: &Chat) -> Result<(), StoreError> {
        if let Ok(mut chats) = self.chats.lock() {
            chats.insert(chat.chat_id.clone(), chat.clone());
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

fn next_id() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
