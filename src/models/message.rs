use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chat::ChatView;
use super::user::UserSummary;

/// A message row. `prev_message_id` of `None` means "not a reply"; forwarded
/// copies always start with `None` no matter what they were forwarded from.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub content_type: String,
    pub prev_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The flat denormalized copy written into `chats.latest_message` whenever a
/// message is created. Carries no chat object, so stored snapshots never nest.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageSnapshot {
    pub id: String,
    pub sender: UserSummary,
    pub content: String,
    pub content_type: String,
    pub prev_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message as served to clients: sender summary and full chat attached by a
/// read-time join.
#[derive(Serialize, Debug, Clone)]
pub struct MessageView {
    pub id: String,
    pub sender: UserSummary,
    pub chat: ChatView,
    pub content: String,
    pub content_type: String,
    pub prev_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
