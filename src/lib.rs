//! # Kanplan Core
//!
//! Core logic for a realtime kanban board: boards contain ordered lists,
//! lists contain ordered cards, and card order is persisted as a dense
//! zero-based `position` column in a remote store.
//!
//! The centerpiece is the ordered-collection reconciler
//! ([`domain::view::BoardView`]): drag-and-drop moves mutate the in-memory
//! view synchronously and optimistically, the changed rows are persisted
//! asynchronously, and any persistence failure or external change falls back
//! to rebuilding the view from an authoritative snapshot. The remote store,
//! change feed, and completion notifier are trait seams; this crate has no
//! dependency on a specific backend or UI.

pub mod domain;
pub mod error;
pub mod notify;
pub mod remote;
pub mod service;
pub mod session;
pub mod sync;

// Re-export commonly used types
pub use domain::{
    entity::{Board, BoardId, Card, CardId, List, ListId, UserId},
    snapshot::Snapshot,
    view::{BoardView, CardWrite, Revision},
};
pub use error::{KanplanError, Result};
pub use notify::{CompletionEvent, CompletionNotifier};
pub use remote::{ChangeEvent, ChangeKind, RemoteStore, Table};
pub use service::{spawn_sync, BoardService, SyncHandle};
pub use session::Session;
pub use sync::DebounceConfig;
