use crate::helper::upload_helpers;
use crate::upload_pipeline::{PendingUpload, PipelineError, PipelineStage, SharedPipeline};
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    author_name: String,
}

#[derive(Serialize)]
struct PipelineSnapshot<'a> {
    upload_id: Uuid,
    stage: PipelineStage,
    author_name: &'a str,
    can_submit: bool,
    items: &'a [PendingUpload],
}

pub fn config_uploads(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(open_upload))
        .route("/{upload_id}", web::get().to(get_upload))
        .route("/{upload_id}/files", web::post().to(add_files))
        .route("/{upload_id}/files/{item_id}", web::delete().to(remove_file))
        .route("/{upload_id}/continue", web::post().to(continue_to_naming))
        .route("/{upload_id}/submit", web::post().to(submit_upload))
        .route("/{upload_id}/cancel", web::post().to(cancel_upload));
}

fn error_response(e: &PipelineError) -> HttpResponse {
    let body = json!({ "success": false, "error": e.notice() });
    match e {
        PipelineError::NoFilesSelected | PipelineError::EmptyAuthorName | PipelineError::NamingPending => {
            HttpResponse::BadRequest().json(body)
        }
        PipelineError::UnknownItem(_) => HttpResponse::NotFound().json(body),
        PipelineError::InvalidStage { .. } | PipelineError::UploadInProgress => HttpResponse::Conflict().json(body),
        PipelineError::Negotiate(_) | PipelineError::Transfer { .. } | PipelineError::Confirm(_) => {
            HttpResponse::BadGateway().json(body)
        }
    }
}

fn locate(state: &AppState, upload_id: &Uuid) -> Result<SharedPipeline, HttpResponse> {
    state.uploads.get(upload_id).ok_or_else(|| {
        HttpResponse::NotFound().json(json!({ "success": false, "error": "Esta subida ya no está disponible." }))
    })
}

async fn open_upload(state: web::Data<AppState>) -> impl Responder {
    let upload_id = state.uploads.open();
    log::info!("Opened upload {} ({} open).", upload_id, state.uploads.len());
    HttpResponse::Created().json(json!({ "upload_id": upload_id }))
}

async fn get_upload(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let upload_id = path.into_inner();
    let pipeline = match locate(&state, &upload_id) {
        Ok(p) => p,
        Err(response) => return response,
    };
    // A batch in flight holds the lock for its whole run.
    let Some(pipeline) = pipeline.try_lock() else {
        return HttpResponse::Ok().json(json!({ "upload_id": upload_id, "stage": PipelineStage::Uploading }));
    };
    HttpResponse::Ok().json(PipelineSnapshot {
        upload_id,
        stage: pipeline.stage(),
        author_name: pipeline.author_name(),
        can_submit: pipeline.can_submit(),
        items: pipeline.items(),
    })
}

async fn add_files(state: web::Data<AppState>, path: web::Path<Uuid>, payload: Multipart) -> impl Responder {
    let upload_id = path.into_inner();
    let pipeline = match locate(&state, &upload_id) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let selection = match upload_helpers::read_selected_files(payload).await {
        Ok(selection) => selection,
        Err(e) => {
            log::warn!("Upload {}: could not read selected files: {}", upload_id, e);
            return HttpResponse::BadRequest().json(json!({ "success": false, "error": e.notice() }));
        }
    };
    let Some(mut pipeline) = pipeline.try_lock() else {
        return error_response(&PipelineError::UploadInProgress);
    };
    match pipeline.add_selection(selection.files, selection.over_cap) {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}

async fn remove_file(state: web::Data<AppState>, path: web::Path<(Uuid, Uuid)>) -> impl Responder {
    let (upload_id, item_id) = path.into_inner();
    let pipeline = match locate(&state, &upload_id) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let Some(mut pipeline) = pipeline.try_lock() else {
        return error_response(&PipelineError::UploadInProgress);
    };
    match pipeline.remove_file(item_id) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "stage": pipeline.stage() })),
        Err(e) => error_response(&e),
    }
}

async fn continue_to_naming(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let upload_id = path.into_inner();
    let pipeline = match locate(&state, &upload_id) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let Some(mut pipeline) = pipeline.try_lock() else {
        return error_response(&PipelineError::UploadInProgress);
    };
    match pipeline.continue_to_naming() {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "stage": pipeline.stage() })),
        Err(e) => error_response(&e),
    }
}

/// Runs the batch on its own task so it finishes even if the guest goes away.
async fn submit_upload(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Json<SubmitForm>,
) -> impl Responder {
    let upload_id = path.into_inner();
    let pipeline = match locate(&state, &upload_id) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let author_name = form.into_inner().author_name;
    let state = state.into_inner();

    let batch = actix_web::rt::spawn(async move {
        let Some(mut pipeline) = pipeline.try_lock() else {
            return Err(PipelineError::UploadInProgress);
        };
        pipeline.set_author_name(&author_name)?;
        let confirmed = pipeline.submit(state.upload_remote.as_ref(), &state.photos).await?;
        state.uploads.remove(&upload_id);
        Ok(confirmed)
    });

    match batch.await {
        Ok(Ok(photos)) => HttpResponse::Ok().json(json!({ "success": true, "photos": photos })),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("Upload {} task ended abnormally: {}", upload_id, e);
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": "No se pudieron subir las fotos. Inténtalo de nuevo." }))
        }
    }
}

async fn cancel_upload(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let upload_id = path.into_inner();
    let Some(pipeline) = state.uploads.get(&upload_id) else {
        return HttpResponse::Ok().json(json!({ "success": true }));
    };
    let Some(mut guard) = pipeline.try_lock() else {
        return error_response(&PipelineError::UploadInProgress);
    };
    if let Err(e) = guard.cancel() {
        return error_response(&e);
    }
    drop(guard);
    state.uploads.remove(&upload_id);
    log::info!("Cancelled upload {}.", upload_id);
    HttpResponse::Ok().json(json!({ "success": true }))
}
