use std::sync::Arc;

use crate::models::remote_operations::{CollectionRemote, MessageRemote, UploadRemote};
use crate::models::{Message, Photo};
use crate::store::{MessageStore, PhotoStore};
use crate::upload_pipeline::UploadSessions;

/// Process-wide state shared by every route: one store per collection and
/// the open upload pipelines.
pub struct AppState {
    pub photos: Arc<PhotoStore>,
    pub messages: Arc<MessageStore>,
    pub uploads: UploadSessions,
    pub upload_remote: Arc<dyn UploadRemote>,
    pub message_remote: Arc<dyn MessageRemote>,
}

impl AppState {
    pub fn new<R>(remote: Arc<R>) -> Self
    where
        R: CollectionRemote<Photo> + CollectionRemote<Message> + UploadRemote + MessageRemote + 'static,
    {
        AppState {
            photos: Arc::new(PhotoStore::new(remote.clone())),
            messages: Arc::new(MessageStore::new(remote.clone())),
            uploads: UploadSessions::new(),
            upload_remote: remote.clone(),
            message_remote: remote,
        }
    }

    /// Runs the first load of both stores.
    pub async fn activate(&self) {
        futures_util::join!(self.photos.activate(), self.messages.activate());
    }
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session_gate;
pub mod store;
pub mod upload_pipeline;
