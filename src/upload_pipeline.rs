//! Multi-photo upload flow.
//!
//! A pipeline collects up to [`MAX_PENDING_UPLOADS`] image files with a local
//! preview each, asks for the uploader's name, and then runs the batch
//! against the remote service in three phases: negotiate write locations,
//! transfer every file directly to its location, confirm the stored keys.
//! Confirmed photos are handed to the shared [`PhotoStore`].
//!
//! Stage machine: `Selecting -> Naming -> Uploading -> Closed`, with a failed
//! batch falling back to `Naming` (files and name kept) and `cancel` closing
//! from any stage except `Uploading`.

use crate::models::remote_models::{ConfirmPhoto, UploadFileSpec};
use crate::models::remote_operations::{RemoteError, UploadRemote};
use crate::models::Photo;
use crate::store::PhotoStore;
use actix_web::web::Bytes;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::future::try_join_all;
use futures_util::lock::Mutex as AsyncMutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_PENDING_UPLOADS: usize = 15;

/// Pipelines untouched for longer than this are dropped when a new one is opened.
pub const IDLE_UPLOAD_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Selecting,
    Naming,
    Uploading,
    Closed,
}

/// A file as picked or dropped by the guest.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingUpload {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    /// `data:` URL rendered at selection time.
    pub preview: String,
    #[serde(skip)]
    bytes: Bytes,
    #[serde(skip)]
    file_key: Option<String>,
}

impl PendingUpload {
    /// Storage key assigned by the last negotiation, if one is in progress.
    pub fn file_key(&self) -> Option<&str> {
        self.file_key.as_deref()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct AddFilesOutcome {
    pub accepted: Vec<Uuid>,
    pub rejected_over_cap: usize,
    pub rejected_not_image: Vec<String>,
    pub notice: Option<String>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot {action} while the pipeline is {stage:?}")]
    InvalidStage { action: &'static str, stage: PipelineStage },
    #[error("No files selected")]
    NoFilesSelected,
    #[error("Uploader name is empty")]
    EmptyAuthorName,
    #[error("Cannot submit before continuing to the naming step")]
    NamingPending,
    #[error("An upload batch is in progress")]
    UploadInProgress,
    #[error("Pending upload {0} not found")]
    UnknownItem(Uuid),
    #[error("Upload URL negotiation failed: {0}")]
    Negotiate(#[source] RemoteError),
    #[error("Transfer of '{file_name}' failed: {source}")]
    Transfer {
        file_name: String,
        #[source]
        source: RemoteError,
    },
    #[error("Upload confirmation failed: {0}")]
    Confirm(#[source] RemoteError),
}

impl PipelineError {
    /// The one message shown to the guest for this failure.
    pub fn notice(&self) -> &'static str {
        match self {
            PipelineError::InvalidStage { .. } => "Esta subida ya no está disponible.",
            PipelineError::NoFilesSelected => "Selecciona al menos una foto.",
            PipelineError::EmptyAuthorName => "Escribe tu nombre para compartir las fotos.",
            PipelineError::NamingPending => "Pulsa continuar y escribe tu nombre antes de subir las fotos.",
            PipelineError::UploadInProgress => "Tus fotos se están subiendo. Espera a que termine.",
            PipelineError::UnknownItem(_) => "Esa foto ya no está en la lista.",
            PipelineError::Negotiate(_) | PipelineError::Transfer { .. } | PipelineError::Confirm(_) => {
                "No se pudieron subir las fotos. Inténtalo de nuevo."
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PipelineError::Negotiate(_) | PipelineError::Transfer { .. } | PipelineError::Confirm(_)
        )
    }
}

pub fn is_image_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}

pub fn render_preview(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type.trim(), STANDARD.encode(bytes))
}

pub struct UploadPipeline {
    id: Uuid,
    stage: PipelineStage,
    items: Vec<PendingUpload>,
    author_name: String,
}

impl Default for UploadPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadPipeline {
    pub fn new() -> Self {
        UploadPipeline {
            id: Uuid::new_v4(),
            stage: PipelineStage::Selecting,
            items: Vec::new(),
            author_name: String::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn items(&self) -> &[PendingUpload] {
        &self.items
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Whether the submit action is enabled.
    pub fn can_submit(&self) -> bool {
        self.stage == PipelineStage::Naming
            && !self.items.is_empty()
            && !self.author_name.trim().is_empty()
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), PipelineError> {
        match self.stage {
            PipelineStage::Selecting | PipelineStage::Naming => Ok(()),
            PipelineStage::Uploading => Err(PipelineError::UploadInProgress),
            PipelineStage::Closed => Err(PipelineError::InvalidStage { action, stage: self.stage }),
        }
    }

    /// Accepts image files up to the cap. Non-images and the excess beyond the
    /// cap are rejected with a notice; items already pending are never touched.
    pub fn add_files(&mut self, files: Vec<SelectedFile>) -> Result<AddFilesOutcome, PipelineError> {
        self.add_selection(files, 0)
    }

    /// `add_files` for a selection whose last `dropped_over_cap` files were
    /// turned away while it was being read. They are reported as over the cap.
    pub fn add_selection(
        &mut self,
        files: Vec<SelectedFile>,
        dropped_over_cap: usize,
    ) -> Result<AddFilesOutcome, PipelineError> {
        self.ensure_editable("add files")?;

        let mut outcome = AddFilesOutcome { rejected_over_cap: dropped_over_cap, ..Default::default() };
        for file in files {
            if !is_image_type(&file.content_type) {
                outcome.rejected_not_image.push(file.file_name);
                continue;
            }
            if self.items.len() >= MAX_PENDING_UPLOADS {
                outcome.rejected_over_cap += 1;
                continue;
            }
            let item = PendingUpload {
                id: Uuid::new_v4(),
                preview: render_preview(&file.content_type, &file.bytes),
                file_name: file.file_name,
                content_type: file.content_type.trim().to_string(),
                bytes: file.bytes,
                file_key: None,
            };
            outcome.accepted.push(item.id);
            self.items.push(item);
        }

        let mut notices = Vec::new();
        if outcome.rejected_over_cap > 0 {
            notices.push(format!("Puedes subir hasta {} fotos a la vez.", MAX_PENDING_UPLOADS));
        }
        if !outcome.rejected_not_image.is_empty() {
            notices.push("Solo se permiten imágenes.".to_string());
        }
        if !notices.is_empty() {
            log::warn!(
                "Upload {}: rejected {} file(s) over the cap and {} non-image file(s).",
                self.id,
                outcome.rejected_over_cap,
                outcome.rejected_not_image.len()
            );
            outcome.notice = Some(notices.join(" "));
        }
        Ok(outcome)
    }

    pub fn remove_file(&mut self, item_id: Uuid) -> Result<(), PipelineError> {
        self.ensure_editable("remove a file")?;
        let position = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(PipelineError::UnknownItem(item_id))?;
        self.items.remove(position);
        if self.items.is_empty() {
            self.stage = PipelineStage::Selecting;
        }
        Ok(())
    }

    pub fn continue_to_naming(&mut self) -> Result<(), PipelineError> {
        self.ensure_editable("continue")?;
        if self.items.is_empty() {
            return Err(PipelineError::NoFilesSelected);
        }
        self.stage = PipelineStage::Naming;
        Ok(())
    }

    pub fn set_author_name(&mut self, name: &str) -> Result<(), PipelineError> {
        self.ensure_editable("set the uploader name")?;
        self.author_name = name.to_string();
        Ok(())
    }

    /// Discards everything and closes. Repeating it is a no-op; it is refused
    /// only while a batch is in flight.
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        match self.stage {
            PipelineStage::Uploading => Err(PipelineError::UploadInProgress),
            PipelineStage::Closed => Ok(()),
            PipelineStage::Selecting | PipelineStage::Naming => {
                self.close();
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.items.clear();
        self.author_name.clear();
        self.stage = PipelineStage::Closed;
    }

    /// Runs the batch. On success the confirmed photos are added to `photos`
    /// and the pipeline closes; on failure it returns to `Naming` with its
    /// files and name intact. Nothing already confirmed is rolled back.
    pub async fn submit(
        &mut self,
        remote: &dyn UploadRemote,
        photos: &PhotoStore,
    ) -> Result<Vec<Photo>, PipelineError> {
        match self.stage {
            PipelineStage::Naming => {}
            PipelineStage::Selecting if self.items.is_empty() => return Err(PipelineError::NoFilesSelected),
            PipelineStage::Selecting => return Err(PipelineError::NamingPending),
            PipelineStage::Uploading => return Err(PipelineError::UploadInProgress),
            PipelineStage::Closed => {
                return Err(PipelineError::InvalidStage { action: "submit", stage: PipelineStage::Closed })
            }
        }
        let author = self.author_name.trim().to_string();
        if author.is_empty() {
            return Err(PipelineError::EmptyAuthorName);
        }
        if self.items.is_empty() {
            return Err(PipelineError::NoFilesSelected);
        }

        self.stage = PipelineStage::Uploading;
        log::info!("Upload {}: sending {} file(s) for '{}'.", self.id, self.items.len(), author);

        match self.run_batch(remote, &author).await {
            Ok(confirmed) => {
                for photo in &confirmed {
                    photos.add(photo.clone());
                }
                log::info!("Upload {}: {} photo(s) confirmed.", self.id, confirmed.len());
                self.close();
                Ok(confirmed)
            }
            Err(e) => {
                log::error!("Upload {} failed: {}", self.id, e);
                // Write locations are one-time; a retry negotiates afresh.
                for item in &mut self.items {
                    item.file_key = None;
                }
                self.stage = PipelineStage::Naming;
                Err(e)
            }
        }
    }

    async fn run_batch(&mut self, remote: &dyn UploadRemote, author: &str) -> Result<Vec<Photo>, PipelineError> {
        let specs: Vec<UploadFileSpec> = self
            .items
            .iter()
            .map(|item| UploadFileSpec {
                file_name: item.file_name.clone(),
                file_type: item.content_type.clone(),
            })
            .collect();

        let targets = remote
            .generate_upload_urls(&specs)
            .await
            .map_err(PipelineError::Negotiate)?;
        if targets.len() != specs.len() {
            return Err(PipelineError::Negotiate(RemoteError::Protocol {
                endpoint: "photos/generate-upload-url".to_string(),
                detail: format!("asked for {} locations, got {}", specs.len(), targets.len()),
            }));
        }
        for (item, target) in self.items.iter_mut().zip(&targets) {
            item.file_key = Some(target.file_key.clone());
        }

        let transfers = self.items.iter().zip(&targets).map(move |(item, target)| async move {
            remote
                .transfer(target, &item.content_type, item.bytes.clone())
                .await
                .map_err(|source| PipelineError::Transfer { file_name: item.file_name.clone(), source })
        });
        try_join_all(transfers).await?;

        let confirmations: Vec<ConfirmPhoto> = targets
            .iter()
            .map(|target| ConfirmPhoto {
                file_key: target.file_key.clone(),
                description: String::new(),
                uploader_name: author.to_string(),
            })
            .collect();

        let confirmed = remote.confirm(&confirmations).await.map_err(|e| {
            let keys: Vec<&str> = confirmations.iter().map(|c| c.file_key.as_str()).collect();
            log::error!("Transferred objects left unconfirmed: {:?}", keys);
            PipelineError::Confirm(e)
        })?;
        if confirmed.len() != confirmations.len() {
            log::warn!(
                "Confirmation returned {} record(s) for {} file(s).",
                confirmed.len(),
                confirmations.len()
            );
        }

        Ok(confirmed.into_iter().map(|payload| payload.into_photo(author)).collect())
    }
}

pub type SharedPipeline = Arc<AsyncMutex<UploadPipeline>>;

struct OpenPipeline {
    last_touched: Instant,
    pipeline: SharedPipeline,
}

/// Open pipelines keyed by their id, one per guest upload dialog.
#[derive(Default)]
pub struct UploadSessions {
    open: Mutex<HashMap<Uuid, OpenPipeline>>,
}

impl UploadSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, OpenPipeline>> {
        self.open.lock().unwrap_or_else(|poisoned| {
            log::error!("Mutex for upload sessions was poisoned! Recovering lock.");
            poisoned.into_inner()
        })
    }

    pub fn open(&self) -> Uuid {
        let now = Instant::now();
        self.evict_idle(now);

        let pipeline = UploadPipeline::new();
        let id = pipeline.id();
        self.entries().insert(
            id,
            OpenPipeline { last_touched: now, pipeline: Arc::new(AsyncMutex::new(pipeline)) },
        );
        id
    }

    /// Drops every pipeline untouched for [`IDLE_UPLOAD_TTL`] as of `now`.
    /// A pipeline that is mid-batch holds its lock and is never evicted.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| {
            now.saturating_duration_since(entry.last_touched) < IDLE_UPLOAD_TTL || entry.pipeline.try_lock().is_none()
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            log::info!("Dropped {} idle upload(s).", evicted);
        }
        evicted
    }

    /// Looks a pipeline up and marks it as in use.
    pub fn get(&self, id: &Uuid) -> Option<SharedPipeline> {
        self.entries().get_mut(id).map(|entry| {
            entry.last_touched = Instant::now();
            entry.pipeline.clone()
        })
    }

    pub fn remove(&self, id: &Uuid) -> Option<SharedPipeline> {
        self.entries().remove(id).map(|entry| entry.pipeline)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::remote_operations::memory_remote::{FailurePoint, MemoryRemote, RemoteCall};
    use std::collections::HashSet;

    fn image(name: &str) -> SelectedFile {
        SelectedFile {
            file_name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: Bytes::from(format!("jpeg bytes of {}", name)),
        }
    }

    fn images(count: usize, prefix: &str) -> Vec<SelectedFile> {
        (0..count).map(|i| image(&format!("{}{}.jpg", prefix, i))).collect()
    }

    fn named_pipeline(files: Vec<SelectedFile>, author: &str) -> UploadPipeline {
        let mut pipeline = UploadPipeline::new();
        pipeline.add_files(files).unwrap();
        pipeline.continue_to_naming().unwrap();
        pipeline.set_author_name(author).unwrap();
        pipeline
    }

    fn setup() -> (Arc<MemoryRemote>, PhotoStore) {
        let remote = Arc::new(MemoryRemote::new());
        let store = PhotoStore::new(remote.clone());
        (remote, store)
    }

    #[test]
    fn selection_renders_previews_immediately() {
        let mut pipeline = UploadPipeline::new();
        let outcome = pipeline.add_files(vec![image("a.jpg")]).unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert!(outcome.notice.is_none());
        let item = &pipeline.items()[0];
        assert!(item.preview.starts_with("data:image/jpeg;base64,"));
        assert_eq!(item.preview, render_preview("image/jpeg", b"jpeg bytes of a.jpg"));
    }

    #[test]
    fn pending_items_never_exceed_the_cap() {
        let mut pipeline = UploadPipeline::new();
        let first = pipeline.add_files(images(10, "a")).unwrap();
        let before: Vec<Uuid> = pipeline.items().iter().map(|i| i.id).collect();

        let second = pipeline.add_files(images(10, "b")).unwrap();

        assert_eq!(first.accepted.len(), 10);
        assert_eq!(second.accepted.len(), 5);
        assert_eq!(second.rejected_over_cap, 5);
        assert!(second.notice.is_some());
        assert_eq!(pipeline.items().len(), MAX_PENDING_UPLOADS);
        let kept: Vec<Uuid> = pipeline.items()[..10].iter().map(|i| i.id).collect();
        assert_eq!(kept, before);

        let third = pipeline.add_files(images(1, "c")).unwrap();
        assert!(third.accepted.is_empty());
        assert_eq!(third.rejected_over_cap, 1);
        assert_eq!(pipeline.items().len(), MAX_PENDING_UPLOADS);
    }

    #[test]
    fn sixteenth_file_in_one_selection_is_rejected() {
        let mut pipeline = UploadPipeline::new();
        let outcome = pipeline.add_files(images(16, "x")).unwrap();

        assert_eq!(outcome.accepted.len(), 15);
        assert_eq!(outcome.rejected_over_cap, 1);
        assert_eq!(pipeline.items().last().unwrap().file_name, "x14.jpg");
    }

    #[test]
    fn non_images_are_rejected_without_touching_state() {
        let mut pipeline = UploadPipeline::new();
        pipeline.add_files(vec![image("a.jpg")]).unwrap();

        let outcome = pipeline
            .add_files(vec![SelectedFile {
                file_name: "notes.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: Bytes::from_static(b"%PDF"),
            }])
            .unwrap();

        assert_eq!(outcome.rejected_not_image, vec!["notes.pdf".to_string()]);
        assert_eq!(pipeline.items().len(), 1);
        assert_eq!(pipeline.stage(), PipelineStage::Selecting);
    }

    #[test]
    fn naming_requires_a_selection() {
        let mut pipeline = UploadPipeline::new();
        assert!(matches!(pipeline.continue_to_naming(), Err(PipelineError::NoFilesSelected)));

        pipeline.add_files(vec![image("a.jpg")]).unwrap();
        pipeline.continue_to_naming().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Naming);
        assert!(!pipeline.can_submit());

        pipeline.set_author_name("  Karen ").unwrap();
        assert!(pipeline.can_submit());
    }

    #[test]
    fn removing_the_last_file_returns_to_selecting() {
        let mut pipeline = named_pipeline(vec![image("a.jpg")], "Leo");
        let id = pipeline.items()[0].id;

        pipeline.remove_file(id).unwrap();

        assert_eq!(pipeline.stage(), PipelineStage::Selecting);
        assert!(matches!(pipeline.remove_file(id), Err(PipelineError::UnknownItem(_))));
    }

    #[test]
    fn cancel_twice_is_a_no_op() {
        let mut pipeline = named_pipeline(images(2, "a"), "Leo");

        pipeline.cancel().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Closed);
        assert!(pipeline.items().is_empty());

        pipeline.cancel().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Closed);
        assert!(pipeline.items().is_empty());
        assert!(matches!(pipeline.add_files(images(1, "b")), Err(PipelineError::InvalidStage { .. })));
    }

    #[actix_web::test]
    async fn blank_author_is_rejected_before_any_network_call() {
        let (remote, store) = setup();
        let mut pipeline = named_pipeline(images(1, "a"), "   ");

        let result = pipeline.submit(remote.as_ref(), &store).await;

        assert!(matches!(result, Err(PipelineError::EmptyAuthorName)));
        assert_eq!(pipeline.stage(), PipelineStage::Naming);
        assert!(remote.calls().is_empty());
    }

    #[actix_web::test]
    async fn submit_from_selecting_asks_to_continue_first() {
        let (remote, store) = setup();
        let mut pipeline = UploadPipeline::new();
        pipeline.add_files(images(1, "a")).unwrap();
        pipeline.set_author_name("Ana").unwrap();

        let result = pipeline.submit(remote.as_ref(), &store).await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::NamingPending));
        assert_ne!(err.notice(), PipelineError::InvalidStage { action: "submit", stage: PipelineStage::Closed }.notice());
        assert_eq!(pipeline.stage(), PipelineStage::Selecting);
        assert_eq!(pipeline.items().len(), 1);
        assert!(remote.calls().is_empty());
    }

    #[actix_web::test]
    async fn submit_with_nothing_selected_asks_for_photos() {
        let (remote, store) = setup();
        let mut pipeline = UploadPipeline::new();

        let result = pipeline.submit(remote.as_ref(), &store).await;

        assert!(matches!(result, Err(PipelineError::NoFilesSelected)));
        assert!(remote.calls().is_empty());
    }

    #[actix_web::test]
    async fn submit_after_close_is_refused() {
        let (remote, store) = setup();
        let mut pipeline = UploadPipeline::new();
        pipeline.cancel().unwrap();

        let result = pipeline.submit(remote.as_ref(), &store).await;

        assert!(matches!(result, Err(PipelineError::InvalidStage { action: "submit", .. })));
    }

    #[actix_web::test]
    async fn negotiate_then_transfer_then_confirm_in_file_order() {
        let (remote, store) = setup();
        let files = vec![image("one.jpg"), image("two.jpg"), image("three.jpg")];
        let mut pipeline = named_pipeline(files, "Karen");

        let confirmed = pipeline.submit(remote.as_ref(), &store).await.unwrap();

        let calls = remote.calls();
        assert_eq!(calls.len(), 5);
        match &calls[0] {
            RemoteCall::Negotiate(specs) => {
                let names: Vec<&str> = specs.iter().map(|s| s.file_name.as_str()).collect();
                assert_eq!(names, vec!["one.jpg", "two.jpg", "three.jpg"]);
                assert!(specs.iter().all(|s| s.file_type == "image/jpeg"));
            }
            other => panic!("expected negotiate first, got {:?}", other),
        }
        let transferred: HashSet<String> = calls[1..4]
            .iter()
            .map(|call| match call {
                RemoteCall::Transfer { file_key, content_type, .. } => {
                    assert_eq!(content_type, "image/jpeg");
                    file_key.clone()
                }
                other => panic!("expected a transfer, got {:?}", other),
            })
            .collect();
        assert_eq!(transferred.len(), 3);
        match &calls[4] {
            RemoteCall::Confirm(photos) => {
                let keys: Vec<&str> = photos.iter().map(|p| p.file_key.as_str()).collect();
                assert!(keys[0].ends_with("one.jpg"));
                assert!(keys[1].ends_with("two.jpg"));
                assert!(keys[2].ends_with("three.jpg"));
                assert!(photos.iter().all(|p| p.uploader_name == "Karen" && p.description.is_empty()));
                assert!(keys.iter().all(|k| transferred.contains(*k)));
            }
            other => panic!("expected confirm last, got {:?}", other),
        }

        assert_eq!(confirmed.len(), 3);
        assert_eq!(pipeline.stage(), PipelineStage::Closed);
        assert!(pipeline.items().is_empty());
        assert_eq!(store.len(), 3);
        assert!(confirmed.iter().all(|p| store.contains(&p.id)));
    }

    #[actix_web::test]
    async fn failed_transfer_skips_confirm_and_keeps_the_batch() {
        let (remote, store) = setup();
        let files = vec![image("one.jpg"), image("two.jpg"), image("three.jpg")];
        let mut pipeline = named_pipeline(files, "Karen");
        let ids: Vec<Uuid> = pipeline.items().iter().map(|i| i.id).collect();
        remote.fail(FailurePoint::Transfer("two.jpg".to_string()));

        let result = pipeline.submit(remote.as_ref(), &store).await;

        let err = result.unwrap_err();
        assert!(matches!(&err, PipelineError::Transfer { file_name, .. } if file_name == "two.jpg"));
        assert!(err.is_remote());
        assert!(!remote.calls().iter().any(|c| matches!(c, RemoteCall::Confirm(_))));
        assert_eq!(pipeline.stage(), PipelineStage::Naming);
        assert_eq!(pipeline.author_name(), "Karen");
        assert_eq!(pipeline.items().iter().map(|i| i.id).collect::<Vec<_>>(), ids);
        assert!(pipeline.items().iter().all(|i| i.file_key().is_none()));
        assert!(store.is_empty());
    }

    #[actix_web::test]
    async fn retry_after_failure_negotiates_again_and_succeeds() {
        let (remote, store) = setup();
        let mut pipeline = named_pipeline(images(2, "a"), "Leo");
        remote.fail(FailurePoint::Confirm);
        assert!(matches!(
            pipeline.submit(remote.as_ref(), &store).await,
            Err(PipelineError::Confirm(_))
        ));
        assert!(store.is_empty());

        remote.recover(&FailurePoint::Confirm);
        let confirmed = pipeline.submit(remote.as_ref(), &store).await.unwrap();

        let negotiations = remote.calls().iter().filter(|c| matches!(c, RemoteCall::Negotiate(_))).count();
        assert_eq!(negotiations, 2);
        assert_eq!(confirmed.len(), 2);
        assert!(confirmed.iter().all(|p| p.uploader_name == "Leo"));
        assert_eq!(store.len(), 2);
    }

    #[actix_web::test]
    async fn failed_negotiation_transfers_nothing() {
        let (remote, store) = setup();
        let mut pipeline = named_pipeline(images(3, "a"), "Leo");
        remote.fail(FailurePoint::Negotiate);

        let result = pipeline.submit(remote.as_ref(), &store).await;

        assert!(matches!(result, Err(PipelineError::Negotiate(_))));
        assert_eq!(remote.calls().len(), 1);
        assert_eq!(pipeline.stage(), PipelineStage::Naming);
        assert_eq!(pipeline.items().len(), 3);
    }

    #[test]
    fn sessions_open_and_remove_pipelines() {
        let sessions = UploadSessions::new();
        let id = sessions.open();

        assert!(sessions.get(&id).is_some());
        assert!(sessions.remove(&id).is_some());
        assert!(sessions.get(&id).is_none());
        assert!(sessions.remove(&id).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn files_dropped_while_reading_count_against_the_cap() {
        let mut pipeline = UploadPipeline::new();

        let outcome = pipeline.add_selection(images(MAX_PENDING_UPLOADS, "a"), 2).unwrap();

        assert_eq!(outcome.accepted.len(), MAX_PENDING_UPLOADS);
        assert_eq!(outcome.rejected_over_cap, 2);
        assert_eq!(outcome.notice.as_deref(), Some("Puedes subir hasta 15 fotos a la vez."));
    }

    #[test]
    fn recently_used_pipelines_survive_eviction() {
        let sessions = UploadSessions::new();
        let used = sessions.open();
        let idle = sessions.open();
        std::thread::sleep(Duration::from_millis(20));
        let touched_at = Instant::now();
        assert!(sessions.get(&used).is_some());

        // Just short of an hour after the touch, but past an hour since opening.
        let evicted = sessions.evict_idle(touched_at + IDLE_UPLOAD_TTL - Duration::from_millis(5));

        assert_eq!(evicted, 1);
        assert!(sessions.get(&used).is_some());
        assert!(sessions.get(&idle).is_none());
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn pipelines_mid_batch_are_never_evicted() {
        let sessions = UploadSessions::new();
        let busy = sessions.open();
        let shared = sessions.get(&busy).unwrap();
        let _batch = shared.try_lock().unwrap();

        let evicted = sessions.evict_idle(Instant::now() + IDLE_UPLOAD_TTL * 2);

        assert_eq!(evicted, 0);
        assert!(sessions.get(&busy).is_some());
    }
}
