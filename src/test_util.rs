use actix_web::http::header;
use chrono::{DateTime, Utc};

use crate::auth;
use crate::config::Config;
use crate::db::Db;

pub fn test_config() -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        database_path: ":memory:".into(),
        jwt_secret: Some("test-secret".into()),
        allowed_origins: vec![],
        token_ttl_days: 30,
    }
}

pub async fn test_db() -> Db {
    Db::connect_in_memory().await.expect("in-memory database")
}

pub fn bearer(cfg: &Config, user_id: &str) -> (header::HeaderName, String) {
    (
        header::AUTHORIZATION,
        format!("Bearer {}", auth::issue_token(user_id, cfg).expect("token")),
    )
}

/// Inserts a user row directly; the hash is a placeholder, so seeded users
/// cannot log in. Register through the endpoint when the test needs that.
pub async fn seed_user(db: &Db, name: &str, email: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users(id, name, email, password_hash, pic, is_online, is_admin, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind("seeded-hash")
    .bind("https://example.com/avatar.png")
    .bind(now)
    .bind(now)
    .execute(&db.0)
    .await
    .expect("seed user");
    id
}

/// First member is the creator.
pub async fn seed_chat(db: &Db, members: &[&str]) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO chats(id, created_by, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(members[0])
        .bind(Utc::now())
        .execute(&db.0)
        .await
        .expect("seed chat");
    for uid in members {
        sqlx::query("INSERT OR IGNORE INTO chat_users(chat_id, user_id) VALUES (?, ?)")
            .bind(&id)
            .bind(*uid)
            .execute(&db.0)
            .await
            .expect("seed chat member");
    }
    id
}

/// Inserts a message row with a chosen creation time, bypassing the handler,
/// so window tests can back-date freely. Does not touch the chat snapshot.
pub async fn seed_message_at(
    db: &Db,
    chat_id: &str,
    sender_id: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO messages(id, chat_id, sender_id, content, content_type, prev_message_id, created_at)
         VALUES (?, ?, ?, ?, 'text', NULL, ?)",
    )
    .bind(&id)
    .bind(chat_id)
    .bind(sender_id)
    .bind(content)
    .bind(created_at)
    .execute(&db.0)
    .await
    .expect("seed message");
    id
}
