use crate::domain::entity::{Board, Card, List, ListId};
use serde::{Deserialize, Serialize};

/// Authoritative board contents as fetched from the remote store.
///
/// A snapshot is ground truth: whenever local state and remote state may have
/// diverged (failed write, external change notification), the in-memory view
/// is rebuilt wholesale from one of these rather than patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub lists: Vec<List>,
    pub cards: Vec<Card>,
}

impl Snapshot {
    pub fn new(board: Board, lists: Vec<List>, cards: Vec<Card>) -> Self {
        Self {
            board,
            lists,
            cards,
        }
    }

    /// Lists sorted by position ascending.
    pub fn lists_ordered(&self) -> Vec<List> {
        let mut lists = self.lists.clone();
        lists.sort_by_key(|l| l.position);
        lists
    }

    /// Cards of one list, sorted by position ascending.
    pub fn cards_for(&self, list_id: &ListId) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| &c.list_id == list_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        cards
    }
}
