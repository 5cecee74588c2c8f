use crate::chat::Chat;
use crate::jsonl::JsonlError;
use std::io;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("chat not found: {0}")]
    NotFound(String),
    #[error("invalid chat id `{0}`")]
    InvalidChatId(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Jsonl(#[from] JsonlError),
}

/// Durable home of chats. Saved once per committed refresh.
pub trait ChatStore {
    fn load(&self, chat_id: &str) -> Result<Chat, StoreError>;

    fn save(&self, chat: &Chat) -> Result<(), StoreError>;
}

/// Chat ids become file names, so keep them to a safe alphabet.
pub fn validate_chat_id(chat_id: &str) -> Result<(), StoreError> {
    let ok = !chat_id.is_empty()
        && chat_id.len() <= 128
        && chat_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !chat_id.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidChatId(chat_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_chat_id() {
        assert!(validate_chat_id("tavern-01").is_ok());
        assert!(validate_chat_id("v1.2_chat").is_ok());
        assert!(validate_chat_id("").is_err());
        assert!(validate_chat_id("../etc").is_err());
        assert!(validate_chat_id(".hidden").is_err());
        assert!(validate_chat_id("a b").is_err());
    }
}
