use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::auth::AuthUser;
use crate::db::Db;
use crate::errors::ApiError;
use crate::models::message::{Message, MessageSnapshot, MessageView};
use crate::models::user::UserSummary;
use crate::routes::chats::load_chat_view;

/// Messages may be edited or deleted for this long after creation, inclusive.
const EDIT_WINDOW_SECS: i64 = 1800;

const MESSAGE_FIELDS: &str =
    "id, chat_id, sender_id, content, content_type, prev_message_id, created_at";

fn required<'a>(field: &'a Option<String>, msg: &str) -> Result<&'a str, ApiError> {
    match field.as_deref() {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::BadRequest(msg.into())),
    }
}

fn message_from_row(r: &SqliteRow) -> Message {
    Message {
        id: r.get("id"),
        chat_id: r.get("chat_id"),
        sender_id: r.get("sender_id"),
        content: r.get("content"),
        content_type: r.get("content_type"),
        prev_message_id: r.get("prev_message_id"),
        created_at: r.get("created_at"),
    }
}

/// Editability is derived from the immutable creation time, whole seconds,
/// inclusive at exactly the window boundary.
fn within_window(message: &Message) -> bool {
    (Utc::now() - message.created_at).num_seconds() <= EDIT_WINDOW_SECS
}

async fn fetch_sender(db: &Db, user_id: &str) -> Result<UserSummary, ApiError> {
    let row = sqlx::query("SELECT id, name, pic, email FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    Ok(UserSummary {
        id: row.get("id"),
        name: row.get("name"),
        pic: row.get("pic"),
        email: row.get("email"),
    })
}

/// Addressing is always (chat, message): a message id outside the named chat
/// does not resolve.
async fn fetch_message(db: &Db, chat_id: &str, message_id: &str) -> Result<Message, ApiError> {
    let row = sqlx::query(&format!(
        "SELECT {MESSAGE_FIELDS} FROM messages WHERE id = ? AND chat_id = ?"
    ))
    .bind(message_id)
    .bind(chat_id)
    .fetch_optional(&db.0)
    .await?;
    row.as_ref().map(message_from_row).ok_or(ApiError::NotFound)
}

/// Inserts a message and copies it into the owning chat's `latest_message`.
/// The copy is flat and made here, at write time; later edits and deletes do
/// not touch it.
async fn insert_message(
    db: &Db,
    sender_id: &str,
    chat_id: &str,
    content: &str,
    content_type: &str,
    prev_message_id: Option<&str>,
) -> Result<Message, ApiError> {
    let chat = sqlx::query("SELECT 1 FROM chats WHERE id = ?")
        .bind(chat_id)
        .fetch_optional(&db.0)
        .await?;
    if chat.is_none() {
        return Err(ApiError::NotFound);
    }
    let sender = fetch_sender(db, sender_id).await?;

    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender_id.to_string(),
        content: content.to_string(),
        content_type: content_type.to_string(),
        prev_message_id: prev_message_id.map(str::to_string),
        created_at: Utc::now(),
    };
    sqlx::query(
        "INSERT INTO messages(id, chat_id, sender_id, content, content_type, prev_message_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.chat_id)
    .bind(&message.sender_id)
    .bind(&message.content)
    .bind(&message.content_type)
    .bind(&message.prev_message_id)
    .bind(message.created_at)
    .execute(&db.0)
    .await?;

    let snapshot = MessageSnapshot {
        id: message.id.clone(),
        sender,
        content: message.content.clone(),
        content_type: message.content_type.clone(),
        prev_message: message.prev_message_id.clone(),
        created_at: message.created_at,
    };
    let snapshot_json = serde_json::to_string(&snapshot).map_err(|_| ApiError::Internal)?;
    sqlx::query("UPDATE chats SET latest_message = ? WHERE id = ?")
        .bind(snapshot_json)
        .bind(chat_id)
        .execute(&db.0)
        .await?;

    Ok(message)
}

async fn build_view(db: &Db, message: &Message) -> Result<MessageView, ApiError> {
    let sender = fetch_sender(db, &message.sender_id).await?;
    let chat = load_chat_view(db, &message.chat_id).await?;
    Ok(MessageView {
        id: message.id.clone(),
        sender,
        chat,
        content: message.content.clone(),
        content_type: message.content_type.clone(),
        prev_message: message.prev_message_id.clone(),
        created_at: message.created_at,
    })
}

pub async fn list_messages(
    db: web::Data<Db>,
    _user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let chat_id = path.into_inner();
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_FIELDS} FROM messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(&chat_id)
    .fetch_all(&db.0)
    .await?;

    // a chat with no history answers with an empty list, never an error
    if rows.is_empty() {
        return Ok(HttpResponse::Ok().json(json!({ "messages": [] })));
    }

    let chat = load_chat_view(&db, &chat_id).await?;
    let mut senders: HashMap<String, UserSummary> = chat
        .users
        .iter()
        .map(|u| (u.id.clone(), u.clone()))
        .collect();

    let mut messages = Vec::with_capacity(rows.len());
    for row in &rows {
        let m = message_from_row(row);
        let sender = match senders.get(&m.sender_id) {
            Some(s) => s.clone(),
            None => {
                // sender may have left the chat since
                let s = fetch_sender(&db, &m.sender_id).await?;
                senders.insert(m.sender_id.clone(), s.clone());
                s
            }
        };
        messages.push(MessageView {
            id: m.id,
            sender,
            chat: chat.clone(),
            content: m.content,
            content_type: m.content_type,
            prev_message: m.prev_message_id,
            created_at: m.created_at,
        });
    }
    Ok(HttpResponse::Ok().json(json!({ "messages": messages })))
}

#[derive(Deserialize)]
pub struct SendMessageReq {
    pub content: Option<String>,
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
    pub content_type: Option<String>,
}

pub async fn send_message(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<SendMessageReq>,
) -> Result<HttpResponse, ApiError> {
    const MSG: &str = "Provide content, chatId and content_type";
    let content = required(&body.content, MSG)?;
    let chat_id = required(&body.chat_id, MSG)?;
    let content_type = required(&body.content_type, MSG)?;

    let message = insert_message(&db, &user.user_id, chat_id, content, content_type, None).await?;
    let view = build_view(&db, &message).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[derive(Deserialize)]
pub struct ReplyMessageReq {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<String>,
}

pub async fn reply_message(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<ReplyMessageReq>,
) -> Result<HttpResponse, ApiError> {
    const MSG: &str = "Provide valid chatId, messageId, content and content_type";
    let chat_id = required(&body.chat_id, MSG)?;
    let message_id = required(&body.message_id, MSG)?;
    let content = required(&body.content, MSG)?;
    let content_type = required(&body.content_type, MSG)?;

    // the replied-to message must live in the named chat; it is returned
    // untouched alongside the new message
    let prev = fetch_message(&db, chat_id, message_id).await?;

    let message = insert_message(
        &db,
        &user.user_id,
        chat_id,
        content,
        content_type,
        Some(&prev.id),
    )
    .await?;
    let view = build_view(&db, &message).await?;

    Ok(HttpResponse::Ok().json(json!({
        "prevMessage": prev,
        "newMessage": view,
    })))
}

#[derive(Deserialize)]
pub struct ForwardMessageReq {
    pub content: Option<String>,
    pub content_type: Option<String>,
    #[serde(rename = "forwardChatId")]
    pub forward_chat_id: Option<String>,
}

/// Forwarding carries content only. The copy starts a fresh thread-local
/// history: no prior-message reference, whatever the source looked like.
pub async fn forward_message(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<ForwardMessageReq>,
) -> Result<HttpResponse, ApiError> {
    const MSG: &str = "Provide valid content, content_type and forwardChatId";
    let content = required(&body.content, MSG)?;
    let content_type = required(&body.content_type, MSG)?;
    let chat_id = required(&body.forward_chat_id, MSG)?;

    let message = insert_message(&db, &user.user_id, chat_id, content, content_type, None).await?;
    let view = build_view(&db, &message).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[derive(Deserialize)]
pub struct EditMessageReq {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    pub content: Option<String>,
}

pub async fn edit_message(
    db: web::Data<Db>,
    _user: AuthUser,
    body: web::Json<EditMessageReq>,
) -> Result<HttpResponse, ApiError> {
    const MSG: &str = "Provide chatId, messageId and content";
    let chat_id = required(&body.chat_id, MSG)?;
    let message_id = required(&body.message_id, MSG)?;
    let content = required(&body.content, MSG)?;

    let prev = fetch_message(&db, chat_id, message_id).await?;
    if !within_window(&prev) {
        return Err(ApiError::WindowExpired);
    }

    sqlx::query("UPDATE messages SET content = ? WHERE id = ?")
        .bind(content)
        .bind(&prev.id)
        .execute(&db.0)
        .await?;

    let mut updated = prev.clone();
    updated.content = content.to_string();
    Ok(HttpResponse::Ok().json(json!({
        "prev": prev,
        "new": updated,
        "status": "Message updated",
    })))
}

#[derive(Deserialize)]
pub struct DeleteMessageReq {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
}

pub async fn delete_message(
    db: web::Data<Db>,
    _user: AuthUser,
    body: web::Json<DeleteMessageReq>,
) -> Result<HttpResponse, ApiError> {
    const MSG: &str = "Provide chatId and messageId";
    let chat_id = required(&body.chat_id, MSG)?;
    let message_id = required(&body.message_id, MSG)?;

    let message = fetch_message(&db, chat_id, message_id).await?;
    if !within_window(&message) {
        return Err(ApiError::WindowExpired);
    }

    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(&message.id)
        .execute(&db.0)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "deleted": message,
        "status": "message deleted",
    })))
}
