use crate::models::PhotoPayload;
use serde::{Deserialize, Serialize};

// --- Upload URL negotiation ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFileSpec {
    pub file_name: String,
    pub file_type: String,
}

#[derive(Serialize)]
pub struct GenerateUploadUrlsRequest<'a> {
    pub files: &'a [UploadFileSpec],
}

/// One-time write location plus the durable key the object will live under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub file_key: String,
}

#[derive(Deserialize)]
pub struct GenerateUploadUrlsResponse {
    pub items: Vec<UploadTarget>,
}

// --- Confirmation ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmPhoto {
    pub file_key: String,
    /// Reserved by the service; always sent empty.
    pub description: String,
    pub uploader_name: String,
}

#[derive(Serialize)]
pub struct ConfirmPhotosRequest<'a> {
    pub photos: &'a [ConfirmPhoto],
}

#[derive(Deserialize)]
pub struct ConfirmPhotosResponse {
    pub items: Vec<PhotoPayload>,
}

// --- Guestbook ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub author: String,
    pub content: String,
}
