use crate::config::Config;
use crate::helper::public_helpers::{self, MessageSubmitError};
use crate::routes::upload;
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

/// Guestbook entries shown on the home page.
pub const HOME_MESSAGE_PREVIEW: usize = 6;

#[derive(Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    author: String,
    #[serde(default)]
    content: String,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/home", web::get().to(get_home))
            .route("/photos", web::get().to(get_photos))
            .route("/photos/refresh", web::post().to(refresh_photos))
            .route("/messages", web::get().to(get_messages))
            .route("/messages", web::post().to(create_message))
            .route("/messages/refresh", web::post().to(refresh_messages))
            .service(web::scope("/uploads").configure(upload::config_uploads)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn get_home(state: web::Data<AppState>, config: web::Data<Config>) -> impl Responder {
    let messages = state.messages.records();
    HttpResponse::Ok().json(json!({
        "countdown": public_helpers::countdown_to(config.event_date),
        "event_date": config.event_date,
        "carousel": state.photos.records(),
        "latest_messages": &messages[..messages.len().min(HOME_MESSAGE_PREVIEW)],
        "donation_url": config.donation_url,
    }))
}

fn photos_body(state: &AppState) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "loading": state.photos.is_loading(),
        "photos": state.photos.records(),
    }))
}

fn messages_body(state: &AppState) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "loading": state.messages.is_loading(),
        "messages": state.messages.records(),
    }))
}

async fn get_photos(state: web::Data<AppState>) -> impl Responder {
    photos_body(&state)
}

async fn refresh_photos(state: web::Data<AppState>) -> impl Responder {
    state.photos.refresh().await;
    photos_body(&state)
}

async fn get_messages(state: web::Data<AppState>) -> impl Responder {
    messages_body(&state)
}

async fn refresh_messages(state: web::Data<AppState>) -> impl Responder {
    state.messages.refresh().await;
    messages_body(&state)
}

async fn create_message(state: web::Data<AppState>, form: web::Json<MessageForm>) -> impl Responder {
    let form = form.into_inner();
    match public_helpers::submit_message(
        state.message_remote.as_ref(),
        &state.messages,
        &form.author,
        &form.content,
    )
    .await
    {
        Ok(message) => HttpResponse::Created().json(message),
        Err(e @ MessageSubmitError::Remote(_)) => {
            log::error!("Failed to submit guestbook message: {}", e);
            HttpResponse::BadGateway().json(json!({ "success": false, "error": e.notice() }))
        }
        Err(e) => HttpResponse::BadRequest().json(json!({ "success": false, "error": e.notice() })),
    }
}
