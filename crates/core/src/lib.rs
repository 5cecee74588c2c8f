pub mod action;
pub mod apply;
pub mod chat;
pub mod dedup;
pub mod extract;
pub mod jsonl;
pub mod prompt;
pub mod refresh;
pub mod repair;
pub mod store;
pub mod table;
pub mod validate;
pub mod window;

pub use action::{ActionKind, EditAction};
pub use apply::{ApplyPolicy, ApplyReport, ApplyWarning, apply_actions};
pub use chat::{Chat, ConversationTurn};
pub use refresh::{CommitError, PlanError, RefreshContext};
pub use store::{ChatStore, StoreError};
pub use table::{Row, RowData, Table, TableSnapshot, TableStructure};
pub use window::{TwoStepWindow, WindowError, WindowOptions};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
