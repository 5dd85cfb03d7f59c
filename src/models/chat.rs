use chrono::{DateTime, Utc};
use serde::Serialize;

use super::user::UserSummary;

/// A chat thread with its participants and the stored `latest_message` value.
/// `latest_message` is whatever JSON was copied in at write time; it is served
/// back verbatim, never re-joined against the live message row.
#[derive(Serialize, Debug, Clone)]
pub struct ChatView {
    pub id: String,
    pub users: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub latest_message: Option<serde_json::Value>,
}
