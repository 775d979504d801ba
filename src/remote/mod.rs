use crate::domain::{Board, BoardId, Card, CardId, List, ListId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;

/// Tables covered by the remote store's change-notification feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Boards,
    Lists,
    Cards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One notification from the change feed. The feed reports changes from all
/// writers, including this client's own writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// The hosted backend's auto-generated CRUD surface, consumed as an opaque
/// remote data store.
///
/// Inserts take an entity carrying a provisional identifier and return the
/// stored row with the remote-assigned one. No multi-row transaction is
/// available; callers must assume any sequence of calls can partially fail.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Boards owned by the user, newest first.
    async fn fetch_boards(&self, owner: &UserId) -> Result<Vec<Board>>;

    /// Lists of one board, position ascending.
    async fn fetch_lists(&self, board_id: &BoardId) -> Result<Vec<List>>;

    /// Cards of the given lists, position ascending.
    async fn fetch_cards(&self, list_ids: &[ListId]) -> Result<Vec<Card>>;

    async fn insert_board(&self, board: &Board) -> Result<Board>;

    async fn insert_list(&self, list: &List) -> Result<List>;

    async fn insert_card(&self, card: &Card) -> Result<Card>;

    /// Updates one card's ordering fields.
    async fn update_card(&self, id: &CardId, list_id: &ListId, position: u32) -> Result<()>;

    async fn delete_card(&self, id: &CardId) -> Result<()>;
}
