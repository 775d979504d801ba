use crate::domain::{
    Board, BoardId, BoardView, Card, CardId, CardWrite, List, ListId, Snapshot,
};
use crate::error::{KanplanError, Result};
use crate::notify::{CompletionEvent, CompletionNotifier, COMPLETION_LIST_TITLE};
use crate::remote::{ChangeEvent, RemoteStore, Table};
use crate::session::Session;
use crate::sync::{DebounceConfig, RefreshScheduler};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Orchestrates the board: optimistic mutations on the in-memory view,
/// asynchronous persistence to the remote store, reconciliation from
/// authoritative snapshots, and the completion hook.
///
/// Every mutation runs its view update as a synchronous critical section
/// (a lock held across no await point), then persists outside the lock.
/// Persistence failures are never returned to mutation callers; they are
/// logged and resolved by rollback or a full snapshot refresh. Read failures
/// during [`load`](Self::load) and [`refresh`](Self::refresh) are returned.
pub struct BoardService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    session: Session,
    view: Mutex<Option<BoardView>>,
}

impl<S, N> BoardService<S, N>
where
    S: RemoteStore,
    N: CompletionNotifier,
{
    /// A service exists only for an authenticated session; without one there
    /// is nothing to construct and no data operation can run.
    pub fn new(store: Arc<S>, notifier: Arc<N>, session: Session) -> Self {
        Self {
            store,
            notifier,
            session,
            view: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs a closure against the current view.
    pub fn with_view<R>(&self, f: impl FnOnce(&BoardView) -> R) -> Result<R> {
        let guard = self.view.lock().unwrap();
        let view = guard.as_ref().ok_or(KanplanError::BoardNotLoaded)?;
        Ok(f(view))
    }

    /// Fetches the user's first board and builds the view. A brand-new
    /// account gets a starter board first.
    pub async fn load(&self) -> Result<()> {
        let boards = self.store.fetch_boards(&self.session.user_id).await?;
        let board = match boards.into_iter().next() {
            Some(board) => board,
            None => self.bootstrap_starter_board().await?,
        };
        let snapshot = self.snapshot_for(board).await?;
        *self.view.lock().unwrap() = Some(BoardView::from_snapshot(&snapshot));
        Ok(())
    }

    /// Re-fetches the authoritative snapshot and reconciles the view.
    ///
    /// The snapshot is applied against the revision observed before the
    /// fetch; if a local mutation lands while the fetch is in flight the
    /// stale snapshot is discarded and the optimistic state stays.
    pub async fn refresh(&self) -> Result<()> {
        let (board_id, basis) = {
            let guard = self.view.lock().unwrap();
            let view = guard.as_ref().ok_or(KanplanError::BoardNotLoaded)?;
            (view.board().id.clone(), view.revision())
        };

        let snapshot = self.fetch_snapshot(&board_id).await?;

        let mut guard = self.view.lock().unwrap();
        if let Some(view) = guard.as_mut() {
            if !view.reconcile(&snapshot, basis) {
                log::debug!(
                    "discarding snapshot fetched at revision {basis}, view is at {}",
                    view.revision()
                );
            }
        }
        Ok(())
    }

    /// Moves a card, optimistically and then persistently.
    ///
    /// The view mutation is synchronous; the position updates for the moved
    /// card and every displaced sibling are persisted afterwards. If any of
    /// those writes fails the incremental state is abandoned and the whole
    /// view is rebuilt from a fresh snapshot. A card landing in the "Done"
    /// list fires the completion notifier; its failures are logged only.
    pub async fn move_card(
        &self,
        card_id: &CardId,
        dest_list: &ListId,
        dest_index: usize,
    ) -> Result<()> {
        let (writes, completion) = {
            let mut guard = self.view.lock().unwrap();
            let view = guard.as_mut().ok_or(KanplanError::BoardNotLoaded)?;
            let writes = view.move_card(card_id, dest_list, dest_index)?;
            let completion = if writes.is_empty() {
                None
            } else {
                self.completion_for(view, card_id, dest_list)
            };
            (writes, completion)
        };

        if writes.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.persist_writes(&writes).await {
            log::warn!("card move persistence failed, reconciling from snapshot: {err}");
            self.refresh().await?;
            return Ok(());
        }

        if let Some(event) = completion {
            if let Err(err) = self.notifier.notify_completion(event).await {
                log::warn!("completion notification failed: {err}");
            }
        }
        Ok(())
    }

    /// Adds a card at the tail of a list. Returns the stored card, or `None`
    /// when persistence failed and the optimistic card was rolled back.
    pub async fn add_card(&self, list_id: &ListId, title: &str) -> Result<Option<Card>> {
        let provisional = {
            let mut guard = self.view.lock().unwrap();
            let view = guard.as_mut().ok_or(KanplanError::BoardNotLoaded)?;
            view.add_card(list_id, title)?
        };

        match self.store.insert_card(&provisional).await {
            Ok(stored) => {
                let mut guard = self.view.lock().unwrap();
                if let Some(view) = guard.as_mut() {
                    view.confirm_card(&provisional.id, stored.clone());
                }
                Ok(Some(stored))
            }
            Err(err) => {
                log::warn!("card insert failed, rolling back optimistic card: {err}");
                let mut guard = self.view.lock().unwrap();
                if let Some(view) = guard.as_mut() {
                    view.discard_card(&provisional.id);
                }
                Ok(None)
            }
        }
    }

    /// Adds a list at the tail of the board. Same contract as
    /// [`add_card`](Self::add_card).
    pub async fn add_list(&self, title: &str) -> Result<Option<List>> {
        let provisional = {
            let mut guard = self.view.lock().unwrap();
            let view = guard.as_mut().ok_or(KanplanError::BoardNotLoaded)?;
            view.add_list(title)?
        };

        match self.store.insert_list(&provisional).await {
            Ok(stored) => {
                let mut guard = self.view.lock().unwrap();
                if let Some(view) = guard.as_mut() {
                    view.confirm_list(&provisional.id, stored.clone());
                }
                Ok(Some(stored))
            }
            Err(err) => {
                log::warn!("list insert failed, rolling back optimistic list: {err}");
                let mut guard = self.view.lock().unwrap();
                if let Some(view) = guard.as_mut() {
                    view.discard_list(&provisional.id);
                }
                Ok(None)
            }
        }
    }

    /// Deletes a card. A card not present in the view is a no-op with no
    /// remote call. A failed remote delete restores the card locally.
    pub async fn delete_card(&self, card_id: &CardId) -> Result<()> {
        let removed = {
            let mut guard = self.view.lock().unwrap();
            let view = guard.as_mut().ok_or(KanplanError::BoardNotLoaded)?;
            view.delete_card(card_id)
        };
        let Some(removed) = removed else {
            return Ok(());
        };

        if removed.card.id.is_provisional() {
            // The insert never confirmed; there is no remote row to delete.
            return Ok(());
        }

        if let Err(err) = self.store.delete_card(&removed.card.id).await {
            log::warn!("card delete persistence failed, restoring card: {err}");
            let mut guard = self.view.lock().unwrap();
            if let Some(view) = guard.as_mut() {
                view.restore_card(removed.card);
            }
            return Ok(());
        }

        if let Err(err) = self.persist_writes(&removed.writes).await {
            log::warn!("sibling renumber after delete failed, reconciling: {err}");
            self.refresh().await?;
        }
        Ok(())
    }

    fn completion_for(
        &self,
        view: &BoardView,
        card_id: &CardId,
        dest_list: &ListId,
    ) -> Option<CompletionEvent> {
        let list = view.list(dest_list)?;
        if list.title != COMPLETION_LIST_TITLE {
            return None;
        }
        let card = view.find_card(card_id)?;
        Some(CompletionEvent {
            card_id: card.id.clone(),
            card_title: card.title.clone(),
            list_title: list.title.clone(),
            user_email: self.session.email.clone(),
        })
    }

    async fn persist_writes(&self, writes: &[CardWrite]) -> Result<()> {
        for write in writes {
            if write.id.is_provisional() {
                // This sibling's insert has not confirmed yet; the remote
                // knows no such row. Its position lands with the next
                // refresh.
                log::debug!("skipping position write for provisional card {}", write.id);
                continue;
            }
            self.store
                .update_card(&write.id, &write.list_id, write.position)
                .await?;
        }
        Ok(())
    }

    async fn fetch_snapshot(&self, board_id: &BoardId) -> Result<Snapshot> {
        let boards = self.store.fetch_boards(&self.session.user_id).await?;
        let board = boards
            .into_iter()
            .find(|b| &b.id == board_id)
            .ok_or(KanplanError::BoardNotLoaded)?;
        self.snapshot_for(board).await
    }

    async fn snapshot_for(&self, board: Board) -> Result<Snapshot> {
        let lists = self.store.fetch_lists(&board.id).await?;
        let list_ids: Vec<ListId> = lists.iter().map(|l| l.id.clone()).collect();
        let cards = self.store.fetch_cards(&list_ids).await?;
        Ok(Snapshot::new(board, lists, cards))
    }

    /// Seeds a new account with a starter board, three lists, and a few
    /// example cards.
    async fn bootstrap_starter_board(&self) -> Result<Board> {
        let mut board = Board::new(
            BoardId::provisional(),
            "My First Board".to_string(),
            self.session.user_id.clone(),
        );
        board.description = Some("A sample kanban board to get you started".to_string());
        let board = self.store.insert_board(&board).await?;

        let mut lists = Vec::new();
        for (position, title) in ["To Do", "In Progress", "Done"].iter().enumerate() {
            let list = List::provisional(board.id.clone(), title.to_string(), position as u32);
            lists.push(self.store.insert_list(&list).await?);
        }

        let starters = [
            (
                0,
                "Welcome to your board!",
                "This is your first card. You can edit or delete it.",
                0,
            ),
            (
                0,
                "Drag and drop cards",
                "Try dragging this card to different lists",
                1,
            ),
            (
                1,
                "Real-time updates",
                "Changes appear instantly across all devices",
                0,
            ),
        ];
        for (list_index, title, description, position) in starters {
            let mut card =
                Card::provisional(lists[list_index].id.clone(), title.to_string(), position);
            card.description = Some(description.to_string());
            self.store.insert_card(&card).await?;
        }

        Ok(board)
    }
}

/// Handle to the background sync tasks. Dropping it tears both down, which
/// is how the change-feed subscription is released.
pub struct SyncHandle {
    forward: JoinHandle<()>,
    refresh: JoinHandle<()>,
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.forward.abort();
        self.refresh.abort();
    }
}

/// Wires a change feed to the service: feed events arm the debounced
/// scheduler, expired timers trigger a snapshot refresh.
pub fn spawn_sync<S, N>(
    service: Arc<BoardService<S, N>>,
    mut feed: broadcast::Receiver<ChangeEvent>,
    config: DebounceConfig,
) -> SyncHandle
where
    S: RemoteStore + 'static,
    N: CompletionNotifier + 'static,
{
    let (scheduler, mut refresh_rx) = RefreshScheduler::new(config);

    let forward = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => scheduler.notify(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("change feed lagged, {missed} events dropped; refreshing all");
                    for table in [Table::Boards, Table::Lists, Table::Cards] {
                        scheduler.notify(ChangeEvent {
                            table,
                            kind: crate::remote::ChangeKind::Update,
                        });
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let refresh = tokio::spawn(async move {
        while let Some(table) = refresh_rx.recv().await {
            if let Err(err) = service.refresh().await {
                log::warn!("refresh after {table:?} change failed: {err}");
            }
        }
    });

    SyncHandle { forward, refresh }
}
