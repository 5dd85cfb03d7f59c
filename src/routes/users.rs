use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::auth::{self, AuthUser};
use crate::config::Config;
use crate::db::Db;
use crate::errors::ApiError;
use crate::models::user::User;

const DEFAULT_PIC: &str =
    "https://icon-library.com/images/anonymous-avatar-icon/anonymous-avatar-icon-25.jpg";

fn user_from_row(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        name: r.get("name"),
        email: r.get("email"),
        pic: r.get("pic"),
        is_online: r.get::<i64, _>("is_online") != 0,
        is_admin: r.get::<i64, _>("is_admin") != 0,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[derive(Deserialize)]
pub struct RegisterReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub pic: Option<String>,
}

pub async fn register(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<RegisterReq>,
) -> Result<HttpResponse, ApiError> {
    let (name, email, password) = match (
        body.name.as_deref().filter(|s| !s.trim().is_empty()),
        body.email.as_deref().filter(|s| !s.trim().is_empty()),
        body.password.as_deref().filter(|s| !s.trim().is_empty()),
    ) {
        (Some(n), Some(e), Some(p)) => (n, e, p),
        _ => {
            return Err(ApiError::BadRequest(
                "name, email and password are required".into(),
            ))
        }
    };

    let exists = sqlx::query("SELECT 1 FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&db.0)
        .await?;
    if exists.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = auth::hash_password(password)?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let pic = body.pic.clone().unwrap_or_else(|| DEFAULT_PIC.to_string());

    sqlx::query(
        "INSERT INTO users(id, name, email, password_hash, pic, is_online, is_admin, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(&hash)
    .bind(&pic)
    .bind(now)
    .bind(now)
    .execute(&db.0)
    .await?;

    let token = auth::issue_token(&id, &cfg)?;
    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "name": name,
        "email": email,
        "is_admin": false,
        "pic": pic,
        "token": token,
    })))
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<LoginReq>,
) -> Result<HttpResponse, ApiError> {
    let (email, password) = match (body.email.as_deref(), body.password.as_deref()) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(ApiError::Unauthorized),
    };

    let row = sqlx::query("SELECT id, name, email, password_hash, pic, is_admin FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::Unauthorized)?;
    let password_hash: String = row.get("password_hash");

    if !auth::verify_password(&password_hash, password) {
        return Err(ApiError::Unauthorized);
    }

    let user_id: String = row.get("id");
    let token = auth::issue_token(&user_id, &cfg)?;
    Ok(HttpResponse::Ok().json(json!({
        "id": user_id,
        "name": row.get::<String, _>("name"),
        "email": row.get::<String, _>("email"),
        "is_admin": row.get::<i64, _>("is_admin") != 0,
        "pic": row.get::<String, _>("pic"),
        "token": token,
    })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Case-insensitive substring match over name and email, always excluding the
/// acting user. No query returns everyone else.
pub async fn search_users(
    db: web::Data<Db>,
    user: AuthUser,
    q: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    const FIELDS: &str = "id, name, email, pic, is_online, is_admin, created_at, updated_at";
    let rows = match q.search.as_deref().filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = format!("%{}%", term);
            sqlx::query(&format!(
                "SELECT {FIELDS} FROM users WHERE (name LIKE ? OR email LIKE ?) AND id != ? ORDER BY name ASC"
            ))
            .bind(&pattern)
            .bind(&pattern)
            .bind(&user.user_id)
            .fetch_all(&db.0)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {FIELDS} FROM users WHERE id != ? ORDER BY name ASC"
            ))
            .bind(&user.user_id)
            .fetch_all(&db.0)
            .await?
        }
    };

    let users: Vec<User> = rows.iter().map(user_from_row).collect();
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

#[derive(Deserialize)]
pub struct PresenceReq {
    // deployed clients send the misspelled key
    #[serde(alias = "usedrId")]
    pub user_id: Option<String>,
}

async fn set_presence(db: &Db, req: &PresenceReq, online: bool) -> Result<HttpResponse, ApiError> {
    let user_id = match req.user_id.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Err(ApiError::BadRequest("user id is required".into())),
    };

    let result = sqlx::query("UPDATE users SET is_online = ?, updated_at = ? WHERE id = ?")
        .bind(online)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&db.0)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(HttpResponse::Ok().json(json!({ "user_id": user_id, "isOnline": online })))
}

pub async fn online(
    db: web::Data<Db>,
    body: web::Json<PresenceReq>,
) -> Result<HttpResponse, ApiError> {
    set_presence(&db, &body, true).await
}

pub async fn offline(
    db: web::Data<Db>,
    body: web::Json<PresenceReq>,
) -> Result<HttpResponse, ApiError> {
    set_presence(&db, &body, false).await
}
