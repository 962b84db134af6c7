use crate::config::Config;
use crate::helper::admin_helpers::{self, BAD_CREDENTIALS_NOTICE, DELETE_FAILED_NOTICE};
use crate::helper::form_helpers;
use crate::models::RecordId;
use crate::session_gate::SessionGate;
use crate::AppState;
use actix_session::Session;
use actix_web::http::header::LOCATION;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub fn config_login(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(login_status))
        .route("", web::post().to(handle_login));
}

pub fn config_dashboard(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(show_dashboard))
        .route("/photos/{id}", web::delete().to(delete_photo_action))
        .route("/messages/{id}", web::delete().to(delete_message_action))
        .route("/refresh", web::post().to(refresh_action))
        .route("/logout", web::post().to(handle_logout));
}

async fn login_status(session: Session) -> impl Responder {
    HttpResponse::Ok().json(json!({ "authenticated": session.is_authenticated() }))
}

async fn handle_login(session: Session, form: web::Bytes, config: web::Data<Config>) -> impl Responder {
    let login = match form_helpers::parse_login_form(&form) {
        Ok(l) => l,
        Err(response) => return response,
    };

    if !admin_helpers::verify_admin_credentials(&login.username, &login.password) {
        log::warn!("Rejected admin login attempt for user '{}'.", login.username);
        return HttpResponse::Unauthorized().json(json!({ "success": false, "error": BAD_CREDENTIALS_NOTICE }));
    }

    if let Err(e) = session.mark_authenticated() {
        log::error!("Failed to mark admin session: {}", e);
        return HttpResponse::InternalServerError().json(json!({ "success": false, "error": "Error al iniciar sesión" }));
    }
    HttpResponse::Found().append_header((LOCATION, config.admin_path())).finish()
}

async fn handle_logout(session: Session) -> impl Responder {
    SessionGate::clear(&session);
    HttpResponse::Found().append_header((LOCATION, "/")).finish()
}

async fn show_dashboard(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(admin_helpers::build_dashboard(&state.photos, &state.messages))
}

async fn refresh_action(state: web::Data<AppState>) -> impl Responder {
    admin_helpers::refresh_all(&state.photos, &state.messages).await;
    HttpResponse::Ok().json(admin_helpers::build_dashboard(&state.photos, &state.messages))
}

async fn delete_photo_action(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let id = RecordId::new(id.into_inner());
    match admin_helpers::delete_photo(&state.photos, &id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            log::error!("Failed to delete photo {}: {}", id, e);
            HttpResponse::BadGateway().json(json!({ "success": false, "error": DELETE_FAILED_NOTICE }))
        }
    }
}

async fn delete_message_action(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let id = RecordId::new(id.into_inner());
    match admin_helpers::delete_message(&state.messages, &id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            log::error!("Failed to delete message {}: {}", id, e);
            HttpResponse::BadGateway().json(json!({ "success": false, "error": DELETE_FAILED_NOTICE }))
        }
    }
}
