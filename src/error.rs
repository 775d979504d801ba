use thiserror::Error;

pub type Result<T> = std::result::Result<T, KanplanError>;

#[derive(Debug, Error)]
pub enum KanplanError {
    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Board not loaded")]
    BoardNotLoaded,

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("No active session")]
    SignedOut,

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
