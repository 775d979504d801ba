use crate::domain::CardId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name of the list whose arrivals count as task completions.
pub const COMPLETION_LIST_TITLE: &str = "Done";

/// Payload handed to the external completion notifier when a card lands in
/// the "Done" list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub card_id: CardId,
    pub card_title: String,
    pub list_title: String,
    pub user_email: String,
}

/// External collaborator that delivers task-completion notifications
/// (serverless function, email service, webhook).
///
/// Delivery failure never affects board state; callers log it and move on.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify_completion(&self, event: CompletionEvent) -> Result<()>;
}

/// Notifier that drops every event. Default for callers that have no
/// delivery channel configured.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl CompletionNotifier for NoopNotifier {
    async fn notify_completion(&self, event: CompletionEvent) -> Result<()> {
        log::debug!(
            "completion notification dropped (no notifier): {} -> {}",
            event.card_title,
            event.user_email
        );
        Ok(())
    }
}
