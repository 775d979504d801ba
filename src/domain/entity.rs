use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix for identifiers generated locally before the remote store has
/// assigned a permanent one.
const PROVISIONAL_PREFIX: &str = "local-";

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a provisional identifier for an optimistic insert.
            pub fn provisional() -> Self {
                Self(format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4()))
            }

            /// True when this identifier was generated locally and has not
            /// yet been replaced by the remote-assigned one.
            pub fn is_provisional(&self) -> bool {
                self.0.starts_with(PROVISIONAL_PREFIX)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier of a board.
    BoardId
);
entity_id!(
    /// Unique identifier of a list within a board.
    ListId
);
entity_id!(
    /// Unique identifier of a card within a list.
    CardId
);
entity_id!(
    /// Identifier of the authenticated owner of a board.
    UserId
);

/// Top-level container owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn new(id: BoardId, title: String, owner: UserId) -> Self {
        Self {
            id,
            title,
            description: None,
            owner,
            created_at: Utc::now(),
        }
    }
}

/// Ordered column of cards within a board.
///
/// `position` is the dense zero-based rank of the list among its board's
/// lists; ascending position is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub board_id: BoardId,
    pub title: String,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

impl List {
    pub fn new(id: ListId, board_id: BoardId, title: String, position: u32) -> Self {
        Self {
            id,
            board_id,
            title,
            position,
            created_at: Utc::now(),
        }
    }

    /// Creates a list with a locally generated identifier, pending remote
    /// confirmation.
    pub fn provisional(board_id: BoardId, title: String, position: u32) -> Self {
        Self::new(ListId::provisional(), board_id, title, position)
    }
}

/// A single task item within a list.
///
/// `position` is the dense zero-based rank of the card among its list's
/// cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub list_id: ListId,
    pub title: String,
    pub description: Option<String>,
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(id: CardId, list_id: ListId, title: String, position: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            list_id,
            title,
            description: None,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a card with a locally generated identifier, pending remote
    /// confirmation.
    pub fn provisional(list_id: ListId, title: String, position: u32) -> Self {
        Self::new(CardId::provisional(), list_id, title, position)
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    pub fn set_description(&mut self, description: String) {
        self.description = Some(description);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_ids_are_flagged() {
        let id = CardId::provisional();
        assert!(id.is_provisional());

        let id = CardId::new("8a2f9c");
        assert!(!id.is_provisional());
    }

    #[test]
    fn test_provisional_ids_are_unique() {
        assert_ne!(CardId::provisional(), CardId::provisional());
    }

    #[test]
    fn test_card_creation() {
        let card = Card::provisional(ListId::new("l1"), "Write docs".to_string(), 3);
        assert!(card.id.is_provisional());
        assert_eq!(card.position, 3);
        assert!(card.description.is_none());
        assert_eq!(card.created_at, card.updated_at);
    }

    #[test]
    fn test_set_title_updates_updated_at() {
        let mut card = Card::new(CardId::new("c1"), ListId::new("l1"), "A".to_string(), 0);
        let initial = card.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(10));
        card.set_title("B".to_string());

        assert!(card.updated_at > initial);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = CardId::new("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
    }
}
