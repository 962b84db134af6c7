use crate::models::remote_operations::RemoteError;
use crate::models::{Message, Photo, RecordId};
use crate::store::{MessageStore, PhotoStore};
use serde::Serialize;
use thiserror::Error;

// Fixed pair for the moderation view; the gate is a convenience, not access control.
const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "boda2026";

pub const DELETE_FAILED_NOTICE: &str = "Error al eliminar";
pub const BAD_CREDENTIALS_NOTICE: &str = "Credenciales incorrectas";

#[derive(Error, Debug)]
pub enum AdminHelperError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

#[derive(Serialize)]
pub struct Dashboard {
    pub photos: Vec<Photo>,
    pub messages: Vec<Message>,
    pub loading_photos: bool,
    pub loading_messages: bool,
}

pub fn verify_admin_credentials(username: &str, password: &str) -> bool {
    username == ADMIN_USERNAME && password == ADMIN_PASSWORD
}

pub fn build_dashboard(photos: &PhotoStore, messages: &MessageStore) -> Dashboard {
    Dashboard {
        photos: photos.records(),
        messages: messages.records(),
        loading_photos: photos.is_loading(),
        loading_messages: messages.is_loading(),
    }
}

pub async fn delete_photo(photos: &PhotoStore, id: &RecordId) -> Result<(), AdminHelperError> {
    Ok(photos.remove(id).await?)
}

pub async fn delete_message(messages: &MessageStore, id: &RecordId) -> Result<(), AdminHelperError> {
    Ok(messages.remove(id).await?)
}

pub async fn refresh_all(photos: &PhotoStore, messages: &MessageStore) {
    futures_util::join!(photos.refresh(), messages.refresh());
}
