use crate::domain::{Board, BoardId, Card, CardId, List, ListId, UserId};
use crate::error::{KanplanError, Result};
use crate::remote::{ChangeEvent, ChangeKind, RemoteStore, Table};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct Rows {
    boards: Vec<Board>,
    lists: Vec<List>,
    cards: HashMap<CardId, Card>,
    next_id: u64,
    /// Remaining writes to let through before failing; None disables
    /// injection.
    writes_until_failure: Option<u32>,
}

/// In-memory [`RemoteStore`] with a broadcast change feed and scriptable
/// write-failure injection. Backs the crate's tests and local runs.
pub struct MemoryStore {
    rows: Mutex<Rows>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            rows: Mutex::new(Rows::default()),
            feed,
        }
    }

    /// Subscribes to the change feed. The feed echoes this client's own
    /// writes, as the hosted backend's does.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Makes every write fail until [`Self::heal`] is called.
    pub fn fail_writes(&self) {
        self.rows.lock().unwrap().writes_until_failure = Some(0);
    }

    /// Lets `n` writes through, then fails the rest. Used to exercise
    /// partial success across a batch of sibling updates.
    pub fn fail_after_writes(&self, n: u32) {
        self.rows.lock().unwrap().writes_until_failure = Some(n);
    }

    pub fn heal(&self) {
        self.rows.lock().unwrap().writes_until_failure = None;
    }

    /// Stored cards of one list, position ascending. Test helper.
    pub fn cards_snapshot(&self, list_id: &ListId) -> Vec<Card> {
        let rows = self.rows.lock().unwrap();
        let mut cards: Vec<Card> = rows
            .cards
            .values()
            .filter(|c| &c.list_id == list_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        cards
    }

    fn check_write(rows: &mut Rows) -> Result<()> {
        match rows.writes_until_failure {
            Some(0) => Err(KanplanError::Remote("injected write failure".to_string())),
            Some(ref mut n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn next_id(rows: &mut Rows, prefix: &str) -> String {
        rows.next_id += 1;
        format!("{}-{}", prefix, rows.next_id)
    }

    fn emit(&self, table: Table, kind: ChangeKind) {
        // No subscribers is fine.
        let _ = self.feed.send(ChangeEvent { table, kind });
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_boards(&self, owner: &UserId) -> Result<Vec<Board>> {
        let rows = self.rows.lock().unwrap();
        let mut boards: Vec<Board> = rows
            .boards
            .iter()
            .filter(|b| &b.owner == owner)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn fetch_lists(&self, board_id: &BoardId) -> Result<Vec<List>> {
        let rows = self.rows.lock().unwrap();
        let mut lists: Vec<List> = rows
            .lists
            .iter()
            .filter(|l| &l.board_id == board_id)
            .cloned()
            .collect();
        lists.sort_by_key(|l| l.position);
        Ok(lists)
    }

    async fn fetch_cards(&self, list_ids: &[ListId]) -> Result<Vec<Card>> {
        let rows = self.rows.lock().unwrap();
        let mut cards: Vec<Card> = rows
            .cards
            .values()
            .filter(|c| list_ids.contains(&c.list_id))
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        Ok(cards)
    }

    async fn insert_board(&self, board: &Board) -> Result<Board> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_write(&mut rows)?;
        let mut stored = board.clone();
        stored.id = BoardId::new(Self::next_id(&mut rows, "board"));
        rows.boards.push(stored.clone());
        drop(rows);
        self.emit(Table::Boards, ChangeKind::Insert);
        Ok(stored)
    }

    async fn insert_list(&self, list: &List) -> Result<List> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_write(&mut rows)?;
        let mut stored = list.clone();
        stored.id = ListId::new(Self::next_id(&mut rows, "list"));
        rows.lists.push(stored.clone());
        drop(rows);
        self.emit(Table::Lists, ChangeKind::Insert);
        Ok(stored)
    }

    async fn insert_card(&self, card: &Card) -> Result<Card> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_write(&mut rows)?;
        let mut stored = card.clone();
        stored.id = CardId::new(Self::next_id(&mut rows, "card"));
        rows.cards.insert(stored.id.clone(), stored.clone());
        drop(rows);
        self.emit(Table::Cards, ChangeKind::Insert);
        Ok(stored)
    }

    async fn update_card(&self, id: &CardId, list_id: &ListId, position: u32) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_write(&mut rows)?;
        let card = rows
            .cards
            .get_mut(id)
            .ok_or_else(|| KanplanError::CardNotFound(id.to_string()))?;
        card.list_id = list_id.clone();
        card.position = position;
        card.updated_at = chrono::Utc::now();
        drop(rows);
        self.emit(Table::Cards, ChangeKind::Update);
        Ok(())
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        Self::check_write(&mut rows)?;
        rows.cards
            .remove(id)
            .ok_or_else(|| KanplanError::CardNotFound(id.to_string()))?;
        drop(rows);
        self.emit(Table::Cards, ChangeKind::Delete);
        Ok(())
    }
}
