use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full user row minus the credential hash, which never leaves the store layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub pic: String,
    pub is_online: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The sender projection embedded in message responses and snapshots.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub pic: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            pic: u.pic,
            email: u.email,
        }
    }
}
