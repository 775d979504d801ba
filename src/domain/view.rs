use crate::domain::entity::{Board, Card, CardId, List, ListId};
use crate::domain::snapshot::Snapshot;
use crate::error::{KanplanError, Result};
use chrono::Utc;
use std::collections::HashMap;

/// Monotonic counter identifying the latest local mutation of a view.
///
/// Snapshots are fetched against a basis revision; a reconcile whose basis is
/// older than the view's current revision is stale and must be rejected.
pub type Revision = u64;

/// Ordering fields of one card row that need to be persisted.
///
/// A mutation returns one of these for every card whose `list_id` or
/// `position` changed, not just the card the caller touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardWrite {
    pub id: CardId,
    pub list_id: ListId,
    pub position: u32,
}

/// Result of removing a card from the view, kept around so a failed remote
/// delete can be rolled back.
#[derive(Debug, Clone)]
pub struct RemovedCard {
    pub card: Card,
    /// Sibling renumbering caused by the removal.
    pub writes: Vec<CardWrite>,
}

/// In-memory ordered view of one board: lists sorted by position, each list's
/// cards sorted by position.
///
/// All mutations are synchronous and leave every list dense (positions are a
/// contiguous `0..n` sequence). Persistence happens elsewhere; each mutation
/// reports the set of rows whose ordering fields changed so the caller can
/// push exactly those to the remote store.
#[derive(Debug, Clone)]
pub struct BoardView {
    board: Board,
    lists: Vec<List>,
    cards: HashMap<ListId, Vec<Card>>,
    revision: Revision,
}

fn renumber(cards: &mut [Card]) {
    for (i, card) in cards.iter_mut().enumerate() {
        card.position = i as u32;
    }
}

fn renumber_lists(lists: &mut [List]) {
    for (i, list) in lists.iter_mut().enumerate() {
        list.position = i as u32;
    }
}

impl BoardView {
    /// Builds a view from an authoritative snapshot.
    ///
    /// Entities are ordered by their stored `position` and then renumbered
    /// densely, so a remote store with position gaps (e.g. after an external
    /// delete) still yields a dense view.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut lists = snapshot.lists_ordered();
        renumber_lists(&mut lists);

        let mut cards = HashMap::new();
        for list in &lists {
            let mut list_cards = snapshot.cards_for(&list.id);
            renumber(&mut list_cards);
            cards.insert(list.id.clone(), list_cards);
        }

        Self {
            board: snapshot.board.clone(),
            lists,
            cards,
            revision: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Lists in display order.
    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    pub fn list(&self, id: &ListId) -> Option<&List> {
        self.lists.iter().find(|l| &l.id == id)
    }

    /// Cards of one list in display order, or `None` for an unknown list.
    pub fn cards_in(&self, list_id: &ListId) -> Option<&[Card]> {
        self.cards.get(list_id).map(|c| c.as_slice())
    }

    pub fn find_card(&self, id: &CardId) -> Option<&Card> {
        self.cards.values().flatten().find(|c| &c.id == id)
    }

    fn locate(&self, id: &CardId) -> Option<(ListId, usize)> {
        for (list_id, cards) in &self.cards {
            if let Some(idx) = cards.iter().position(|c| &c.id == id) {
                return Some((list_id.clone(), idx));
            }
        }
        None
    }

    /// Moves a card to `dest_index` within `dest_list` (which may be its
    /// current list), renumbering both affected lists densely.
    ///
    /// `dest_index` is clamped to the destination's length after removal.
    /// Returns the ordering writes to persist; an empty set means the move
    /// was a no-op and nothing needs to be sent to the remote store.
    pub fn move_card(
        &mut self,
        card_id: &CardId,
        dest_list: &ListId,
        dest_index: usize,
    ) -> Result<Vec<CardWrite>> {
        if !self.cards.contains_key(dest_list) {
            return Err(KanplanError::ListNotFound(dest_list.to_string()));
        }
        let (src_list, src_index) = self
            .locate(card_id)
            .ok_or_else(|| KanplanError::CardNotFound(card_id.to_string()))?;

        // Dropped back where it started: skip the renumber and the writes.
        if src_list == *dest_list && src_index == dest_index {
            return Ok(Vec::new());
        }

        let mut before: HashMap<CardId, (ListId, u32)> = HashMap::new();
        for id in [&src_list, dest_list] {
            for card in &self.cards[id] {
                before.insert(card.id.clone(), (card.list_id.clone(), card.position));
            }
        }

        let source = self.cards.get_mut(&src_list).expect("source list exists");
        let mut card = source.remove(src_index);
        renumber(source);

        let destination = self.cards.get_mut(dest_list).expect("dest list exists");
        let index = dest_index.min(destination.len());
        card.list_id = dest_list.clone();
        card.updated_at = Utc::now();
        destination.insert(index, card);
        renumber(destination);

        let mut writes = Vec::new();
        let mut affected = vec![&src_list];
        if *dest_list != src_list {
            affected.push(dest_list);
        }
        for id in affected {
            for card in &self.cards[id] {
                let unchanged = before
                    .get(&card.id)
                    .is_some_and(|(l, p)| l == &card.list_id && *p == card.position);
                if !unchanged {
                    writes.push(CardWrite {
                        id: card.id.clone(),
                        list_id: card.list_id.clone(),
                        position: card.position,
                    });
                }
            }
        }

        if !writes.is_empty() {
            self.revision += 1;
        }
        Ok(writes)
    }

    /// Appends a provisional card at the tail of `list_id`.
    pub fn add_card(&mut self, list_id: &ListId, title: &str) -> Result<Card> {
        let title = title.trim();
        if title.is_empty() {
            return Err(KanplanError::EmptyTitle);
        }
        let cards = self
            .cards
            .get_mut(list_id)
            .ok_or_else(|| KanplanError::ListNotFound(list_id.to_string()))?;

        let card = Card::provisional(list_id.clone(), title.to_string(), cards.len() as u32);
        cards.push(card.clone());
        self.revision += 1;
        Ok(card)
    }

    /// Replaces a provisional card's identity with the remote-assigned row.
    ///
    /// The card's current local list and position win over the stored row's
    /// (a reorder may have happened while the insert was in flight). Returns
    /// false when the provisional card is no longer in the view.
    pub fn confirm_card(&mut self, provisional: &CardId, stored: Card) -> bool {
        for cards in self.cards.values_mut() {
            if let Some(card) = cards.iter_mut().find(|c| &c.id == provisional) {
                card.id = stored.id;
                card.created_at = stored.created_at;
                card.updated_at = stored.updated_at;
                return true;
            }
        }
        false
    }

    /// Removes a provisional card after a failed insert. Trailing inserts
    /// displace no siblings, but renumber anyway in case the list changed
    /// underneath.
    pub fn discard_card(&mut self, provisional: &CardId) -> Option<Card> {
        let (list_id, index) = self.locate(provisional)?;
        let cards = self.cards.get_mut(&list_id)?;
        let card = cards.remove(index);
        renumber(cards);
        self.revision += 1;
        Some(card)
    }

    /// Appends a provisional list at the tail of the board.
    pub fn add_list(&mut self, title: &str) -> Result<List> {
        let title = title.trim();
        if title.is_empty() {
            return Err(KanplanError::EmptyTitle);
        }
        let list = List::provisional(
            self.board.id.clone(),
            title.to_string(),
            self.lists.len() as u32,
        );
        self.cards.insert(list.id.clone(), Vec::new());
        self.lists.push(list.clone());
        self.revision += 1;
        Ok(list)
    }

    /// Replaces a provisional list's identity with the remote-assigned row,
    /// re-keying its cards. Returns false when the list is gone.
    pub fn confirm_list(&mut self, provisional: &ListId, stored: List) -> bool {
        let Some(list) = self.lists.iter_mut().find(|l| &l.id == provisional) else {
            return false;
        };
        list.id = stored.id.clone();
        list.created_at = stored.created_at;
        if let Some(mut cards) = self.cards.remove(provisional) {
            for card in &mut cards {
                card.list_id = stored.id.clone();
            }
            self.cards.insert(stored.id, cards);
        }
        true
    }

    /// Removes a provisional list after a failed insert.
    pub fn discard_list(&mut self, provisional: &ListId) -> Option<List> {
        let index = self.lists.iter().position(|l| &l.id == provisional)?;
        let list = self.lists.remove(index);
        self.cards.remove(provisional);
        renumber_lists(&mut self.lists);
        self.revision += 1;
        Some(list)
    }

    /// Removes a card and renumbers its siblings.
    ///
    /// Returns `None` for a card not present in the view; that is a caller
    /// no-op, not an error.
    pub fn delete_card(&mut self, card_id: &CardId) -> Option<RemovedCard> {
        let (list_id, index) = self.locate(card_id)?;
        let cards = self.cards.get_mut(&list_id).expect("list exists");
        let card = cards.remove(index);
        renumber(cards);

        let writes = cards[index..]
            .iter()
            .map(|c| CardWrite {
                id: c.id.clone(),
                list_id: c.list_id.clone(),
                position: c.position,
            })
            .collect();

        self.revision += 1;
        Some(RemovedCard { card, writes })
    }

    /// Puts a deleted card back after a failed remote delete.
    ///
    /// The card goes back at its old position clamped to the list's current
    /// length; siblings may have moved since the delete, so the exact slot
    /// is best-effort. Returns false when the card's list is gone.
    pub fn restore_card(&mut self, card: Card) -> bool {
        let Some(cards) = self.cards.get_mut(&card.list_id) else {
            return false;
        };
        let index = (card.position as usize).min(cards.len());
        cards.insert(index, card);
        renumber(cards);
        self.revision += 1;
        true
    }

    /// Replaces the whole view from an authoritative snapshot.
    ///
    /// `basis` is the view revision observed when the snapshot fetch started.
    /// A snapshot fetched before the latest local mutation is stale and is
    /// rejected (returns false); the optimistic state stays in place and the
    /// caller should fetch again.
    pub fn reconcile(&mut self, snapshot: &Snapshot, basis: Revision) -> bool {
        if basis < self.revision {
            return false;
        }
        let revision = self.revision;
        *self = Self::from_snapshot(snapshot);
        self.revision = revision;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{BoardId, UserId};

    fn card(id: &str, list: &str, title: &str, position: u32) -> Card {
        Card::new(
            CardId::new(id),
            ListId::new(list),
            title.to_string(),
            position,
        )
    }

    fn snapshot() -> Snapshot {
        let board_id = BoardId::new("b1");
        Snapshot::new(
            Board::new(board_id.clone(), "Board".to_string(), UserId::new("u1")),
            vec![
                List::new(ListId::new("todo"), board_id.clone(), "To Do".to_string(), 0),
                List::new(ListId::new("done"), board_id, "Done".to_string(), 1),
            ],
            vec![
                card("a", "todo", "Card A", 0),
                card("b", "todo", "Card B", 1),
                card("c", "done", "Card C", 0),
            ],
        )
    }

    fn view() -> BoardView {
        BoardView::from_snapshot(&snapshot())
    }

    fn assert_dense(view: &BoardView) {
        for list in view.lists() {
            let cards = view.cards_in(&list.id).unwrap();
            for (i, card) in cards.iter().enumerate() {
                assert_eq!(card.position, i as u32, "gap in list {}", list.id);
                assert_eq!(card.list_id, list.id);
            }
        }
    }

    fn titles(view: &BoardView, list: &str) -> Vec<String> {
        view.cards_in(&ListId::new(list))
            .unwrap()
            .iter()
            .map(|c| c.title.clone())
            .collect()
    }

    #[test]
    fn test_cross_list_move() {
        let mut view = view();
        let writes = view
            .move_card(&CardId::new("b"), &ListId::new("done"), 0)
            .unwrap();

        assert_eq!(titles(&view, "todo"), vec!["Card A"]);
        assert_eq!(titles(&view, "done"), vec!["Card B", "Card C"]);
        assert_dense(&view);

        // B changed list and position, C was displaced from 0 to 1.
        assert_eq!(writes.len(), 2);
        let b = writes.iter().find(|w| w.id.as_str() == "b").unwrap();
        assert_eq!(b.list_id.as_str(), "done");
        assert_eq!(b.position, 0);
        let c = writes.iter().find(|w| w.id.as_str() == "c").unwrap();
        assert_eq!(c.position, 1);
    }

    #[test]
    fn test_same_list_reorder() {
        let mut view = view();
        let writes = view
            .move_card(&CardId::new("a"), &ListId::new("todo"), 1)
            .unwrap();

        assert_eq!(titles(&view, "todo"), vec!["Card B", "Card A"]);
        assert_dense(&view);
        assert_eq!(writes.len(), 2);
    }

    #[test]
    fn test_move_to_current_index_is_noop() {
        let mut view = view();
        let revision = view.revision();
        let writes = view
            .move_card(&CardId::new("b"), &ListId::new("todo"), 1)
            .unwrap();

        assert!(writes.is_empty());
        assert_eq!(view.revision(), revision);
        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B"]);
    }

    #[test]
    fn test_move_index_clamped_past_end() {
        let mut view = view();
        let writes = view
            .move_card(&CardId::new("a"), &ListId::new("done"), 99)
            .unwrap();

        assert_eq!(titles(&view, "done"), vec!["Card C", "Card A"]);
        assert_dense(&view);
        // A changed list, B slid down in the source; C kept its slot.
        let ids: Vec<&str> = writes.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(writes.len(), 2);
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"b"));
    }

    #[test]
    fn test_move_unknown_card_is_error() {
        let mut view = view();
        let err = view
            .move_card(&CardId::new("ghost"), &ListId::new("done"), 0)
            .unwrap_err();
        assert!(matches!(err, KanplanError::CardNotFound(_)));
        assert_eq!(titles(&view, "done"), vec!["Card C"]);
    }

    #[test]
    fn test_move_unknown_list_is_error() {
        let mut view = view();
        let err = view
            .move_card(&CardId::new("a"), &ListId::new("ghost"), 0)
            .unwrap_err();
        assert!(matches!(err, KanplanError::ListNotFound(_)));
        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B"]);
    }

    #[test]
    fn test_positions_dense_after_move_sequence() {
        let mut view = view();
        let moves = [
            ("a", "done", 0),
            ("c", "todo", 0),
            ("b", "todo", 2),
            ("a", "todo", 1),
            ("c", "done", 5),
        ];
        for (card, list, index) in moves {
            view.move_card(&CardId::new(card), &ListId::new(list), index)
                .unwrap();
            assert_dense(&view);
        }
    }

    #[test]
    fn test_card_in_exactly_one_list() {
        let mut view = view();
        view.move_card(&CardId::new("b"), &ListId::new("done"), 0)
            .unwrap();

        let occurrences = view
            .lists()
            .iter()
            .flat_map(|l| view.cards_in(&l.id).unwrap())
            .filter(|c| c.id.as_str() == "b")
            .count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_add_card_appends_provisional() {
        let mut view = view();
        let card = view.add_card(&ListId::new("todo"), "Card D").unwrap();

        assert!(card.id.is_provisional());
        assert_eq!(card.position, 2);
        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B", "Card D"]);
        assert_dense(&view);
    }

    #[test]
    fn test_add_card_empty_title_rejected() {
        let mut view = view();
        assert!(matches!(
            view.add_card(&ListId::new("todo"), "   "),
            Err(KanplanError::EmptyTitle)
        ));
        assert_eq!(titles(&view, "todo").len(), 2);
    }

    #[test]
    fn test_confirm_card_swaps_identity_keeps_order() {
        let mut view = view();
        let provisional = view.add_card(&ListId::new("todo"), "Card D").unwrap();
        // Local reorder while the insert is in flight.
        view.move_card(&provisional.id, &ListId::new("todo"), 0)
            .unwrap();

        let stored = card("d", "todo", "Card D", 2);
        assert!(view.confirm_card(&provisional.id, stored));

        let cards = view.cards_in(&ListId::new("todo")).unwrap();
        assert_eq!(cards[0].id.as_str(), "d");
        assert_eq!(cards[0].position, 0);
        assert_dense(&view);
    }

    #[test]
    fn test_discard_card_rolls_back_insert() {
        let mut view = view();
        let provisional = view.add_card(&ListId::new("todo"), "Card D").unwrap();
        assert!(view.discard_card(&provisional.id).is_some());

        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B"]);
        assert_dense(&view);
    }

    #[test]
    fn test_add_list_and_confirm() {
        let mut view = view();
        let provisional = view.add_list("Blocked").unwrap();
        assert!(provisional.id.is_provisional());
        assert_eq!(provisional.position, 2);

        view.add_card(&provisional.id, "Stuck").unwrap();

        let stored = List::new(
            ListId::new("blocked"),
            view.board().id.clone(),
            "Blocked".to_string(),
            2,
        );
        assert!(view.confirm_list(&provisional.id, stored));

        let cards = view.cards_in(&ListId::new("blocked")).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].list_id.as_str(), "blocked");
    }

    #[test]
    fn test_discard_list_renumbers_remaining() {
        let mut view = view();
        let provisional = view.add_list("Blocked").unwrap();
        let second = view.add_list("Someday").unwrap();
        assert!(view.discard_list(&provisional.id).is_some());

        assert_eq!(view.list(&second.id).unwrap().position, 2);
        let positions: Vec<u32> = view.lists().iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_delete_card_renumbers_and_reports_writes() {
        let mut view = view();
        let removed = view.delete_card(&CardId::new("a")).unwrap();

        assert_eq!(removed.card.id.as_str(), "a");
        assert_eq!(titles(&view, "todo"), vec!["Card B"]);
        assert_dense(&view);
        // B slid from 1 to 0.
        assert_eq!(removed.writes.len(), 1);
        assert_eq!(removed.writes[0].id.as_str(), "b");
        assert_eq!(removed.writes[0].position, 0);
    }

    #[test]
    fn test_delete_unknown_card_is_noop() {
        let mut view = view();
        let revision = view.revision();
        assert!(view.delete_card(&CardId::new("ghost")).is_none());
        assert_eq!(view.revision(), revision);
    }

    #[test]
    fn test_restore_card_returns_to_original_slot() {
        let mut view = view();
        let removed = view.delete_card(&CardId::new("a")).unwrap();
        assert!(view.restore_card(removed.card));

        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B"]);
        assert_dense(&view);
    }

    #[test]
    fn test_reconcile_replaces_view() {
        let mut view = view();
        view.move_card(&CardId::new("b"), &ListId::new("done"), 0)
            .unwrap();

        // Authoritative state says the move never happened.
        let applied = view.reconcile(&snapshot(), view.revision());
        assert!(applied);
        assert_eq!(titles(&view, "todo"), vec!["Card A", "Card B"]);
        assert_eq!(titles(&view, "done"), vec!["Card C"]);
    }

    #[test]
    fn test_stale_reconcile_rejected() {
        let mut view = view();
        let basis = view.revision();
        // A mutation lands after the snapshot fetch started.
        view.move_card(&CardId::new("b"), &ListId::new("done"), 0)
            .unwrap();

        let applied = view.reconcile(&snapshot(), basis);
        assert!(!applied);
        // Optimistic result stays.
        assert_eq!(titles(&view, "done"), vec!["Card B", "Card C"]);
    }

    #[test]
    fn test_reconcile_renumbers_sparse_positions() {
        let board_id = BoardId::new("b1");
        let sparse = Snapshot::new(
            Board::new(board_id.clone(), "Board".to_string(), UserId::new("u1")),
            vec![List::new(
                ListId::new("todo"),
                board_id,
                "To Do".to_string(),
                0,
            )],
            vec![
                card("a", "todo", "Card A", 3),
                card("b", "todo", "Card B", 9),
            ],
        );

        let view = BoardView::from_snapshot(&sparse);
        assert_dense(&view);
    }

    #[test]
    fn test_reconcile_preserves_revision_counter() {
        let mut view = view();
        view.move_card(&CardId::new("b"), &ListId::new("done"), 0)
            .unwrap();
        let revision = view.revision();

        assert!(view.reconcile(&snapshot(), revision));
        assert_eq!(view.revision(), revision);
    }
}
