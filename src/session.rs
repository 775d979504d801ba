use crate::domain::UserId;
use serde::{Deserialize, Serialize};

/// Identity supplied by the managed auth layer. Without one the service
/// performs no data operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
}

impl Session {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}
