pub mod entity;
pub mod snapshot;
pub mod view;

pub use entity::{Board, BoardId, Card, CardId, List, ListId, UserId};
pub use snapshot::Snapshot;
pub use view::{BoardView, CardWrite, RemovedCard, Revision};
