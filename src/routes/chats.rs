use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::auth::AuthUser;
use crate::db::Db;
use crate::errors::ApiError;
use crate::models::chat::ChatView;
use crate::models::user::UserSummary;

/// Read-time join of a chat row, its participants, and the stored
/// `latest_message` value.
pub(crate) async fn load_chat_view(db: &Db, chat_id: &str) -> Result<ChatView, ApiError> {
    let row = sqlx::query("SELECT id, created_at, latest_message FROM chats WHERE id = ?")
        .bind(chat_id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;

    let users: Vec<UserSummary> = sqlx::query(
        "SELECT u.id, u.name, u.pic, u.email FROM users u
         INNER JOIN chat_users cu ON cu.user_id = u.id
         WHERE cu.chat_id = ? ORDER BY u.name ASC",
    )
    .bind(chat_id)
    .fetch_all(&db.0)
    .await?
    .into_iter()
    .map(|r| UserSummary {
        id: r.get("id"),
        name: r.get("name"),
        pic: r.get("pic"),
        email: r.get("email"),
    })
    .collect();

    let latest_message = row
        .get::<Option<String>, _>("latest_message")
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(ChatView {
        id: row.get("id"),
        users,
        created_at: row.get("created_at"),
        latest_message,
    })
}

#[derive(Deserialize)]
pub struct CreateChatReq {
    pub user_ids: Option<Vec<String>>,
}

pub async fn create_chat(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<CreateChatReq>,
) -> Result<HttpResponse, ApiError> {
    let user_ids = match body.user_ids.as_deref() {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ApiError::BadRequest("user_ids required".into())),
    };

    for uid in user_ids {
        let exists = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(uid)
            .fetch_optional(&db.0)
            .await?;
        if exists.is_none() {
            return Err(ApiError::NotFound);
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut tx = db.0.begin().await?;
    sqlx::query("INSERT INTO chats(id, created_by, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(&user.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO chat_users(chat_id, user_id) VALUES (?, ?)")
        .bind(&id)
        .bind(&user.user_id)
        .execute(&mut *tx)
        .await?;
    for uid in user_ids {
        if uid == &user.user_id {
            continue;
        }
        sqlx::query("INSERT OR IGNORE INTO chat_users(chat_id, user_id) VALUES (?, ?)")
            .bind(&id)
            .bind(uid)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let chat = load_chat_view(&db, &id).await?;
    Ok(HttpResponse::Ok().json(chat))
}

pub async fn list_chats(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query(
        "SELECT c.id FROM chats c
         INNER JOIN chat_users cu ON cu.chat_id = c.id
         WHERE cu.user_id = ? ORDER BY c.created_at DESC",
    )
    .bind(&user.user_id)
    .fetch_all(&db.0)
    .await?;

    let mut chats = Vec::with_capacity(rows.len());
    for r in rows {
        chats.push(load_chat_view(&db, &r.get::<String, _>("id")).await?);
    }
    Ok(HttpResponse::Ok().json(json!({ "chats": chats })))
}

#[cfg(test)]
mod tests {
    use crate::test_util::*;
    use actix_web::http::StatusCode;
    use actix_web::web::Data;
    use actix_web::{test, App};
    use serde_json::json;

    macro_rules! app {
        ($cfg:expr, $db:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new($cfg.clone()))
                    .app_data(Data::new($db.clone()))
                    .configure(crate::routes::api),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn create_chat_includes_creator_and_participants() {
        let cfg = test_config();
        let db = test_db().await;
        let anna = seed_user(&db, "Anna", "anna@x.com").await;
        let bob = seed_user(&db, "Bob", "bob@x.com").await;
        let app = app!(cfg, db);

        let req = test::TestRequest::post()
            .uri("/api/chats")
            .insert_header(bearer(&cfg, &anna))
            .set_json(json!({ "user_ids": [bob] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(body["latest_message"].is_null());
    }

    #[actix_web::test]
    async fn create_chat_validates_participants() {
        let cfg = test_config();
        let db = test_db().await;
        let anna = seed_user(&db, "Anna", "anna@x.com").await;
        let app = app!(cfg, db);

        let req = test::TestRequest::post()
            .uri("/api/chats")
            .insert_header(bearer(&cfg, &anna))
            .set_json(json!({ "user_ids": [] }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::post()
            .uri("/api/chats")
            .insert_header(bearer(&cfg, &anna))
            .set_json(json!({ "user_ids": ["no-such-user"] }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_web::test]
    async fn list_chats_only_returns_own_threads() {
        let cfg = test_config();
        let db = test_db().await;
        let anna = seed_user(&db, "Anna", "anna@x.com").await;
        let bob = seed_user(&db, "Bob", "bob@x.com").await;
        let carl = seed_user(&db, "Carl", "carl@x.com").await;
        seed_chat(&db, &[&anna, &bob]).await;
        let app = app!(cfg, db);

        let req = test::TestRequest::get()
            .uri("/api/chats")
            .insert_header(bearer(&cfg, &anna))
            .to_request();
        let body: serde_json::Value =
            test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["chats"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri("/api/chats")
            .insert_header(bearer(&cfg, &carl))
            .to_request();
        let body: serde_json::Value =
            test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["chats"].as_array().unwrap().len(), 0);
    }
}
