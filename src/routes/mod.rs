pub mod chats;
pub mod messages;
pub mod users;

use actix_web::web;

/// The full route table, mounted by `main` and by the test harness.
pub fn api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/users")
                    .route("", web::get().to(users::search_users))
                    .route("", web::post().to(users::register))
                    .route("/login", web::post().to(users::login))
                    .route("/online", web::post().to(users::online))
                    .route("/offline", web::post().to(users::offline)),
            )
            .service(
                web::scope("/chats")
                    .route("", web::get().to(chats::list_chats))
                    .route("", web::post().to(chats::create_chat)),
            )
            .service(
                web::scope("/messages")
                    .route("", web::post().to(messages::send_message))
                    .route("", web::put().to(messages::edit_message))
                    .route("", web::delete().to(messages::delete_message))
                    .route("/reply", web::post().to(messages::reply_message))
                    .route("/forward", web::post().to(messages::forward_message))
                    .route("/{chat_id}", web::get().to(messages::list_messages)),
            ),
    );
}
