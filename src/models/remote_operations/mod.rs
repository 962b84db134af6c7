//! Client side of the remote collection service.
//!
//! The service owns the canonical photo and message records plus the binary
//! storage behind them. Everything in this crate talks to it through the
//! three traits below, so stores and pipelines can run against either the
//! HTTP client or the in-memory stand-in.

use crate::models::remote_models::{ConfirmPhoto, NewMessage, UploadFileSpec, UploadTarget};
use crate::models::{Message, PhotoPayload, RecordId};
use actix_web::web::Bytes;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub mod memory_remote;
pub mod messages_remote_operations;
pub mod photos_remote_operations;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Invalid service URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Unexpected response from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },
}

/// Read and delete access to one collection (`/photos/` or `/messages/`).
pub trait CollectionRemote<T>: Send + Sync {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<T>, RemoteError>>;
    fn delete<'a>(&'a self, id: &'a RecordId) -> BoxFuture<'a, Result<(), RemoteError>>;
}

/// The negotiate, transfer and confirm phases of a photo upload.
pub trait UploadRemote: Send + Sync {
    /// Returns one target per requested file, in request order.
    fn generate_upload_urls<'a>(
        &'a self,
        files: &'a [UploadFileSpec],
    ) -> BoxFuture<'a, Result<Vec<UploadTarget>, RemoteError>>;

    fn transfer<'a>(
        &'a self,
        target: &'a UploadTarget,
        content_type: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;

    fn confirm<'a>(
        &'a self,
        photos: &'a [ConfirmPhoto],
    ) -> BoxFuture<'a, Result<Vec<PhotoPayload>, RemoteError>>;
}

pub trait MessageRemote: Send + Sync {
    fn create<'a>(&'a self, message: &'a NewMessage) -> BoxFuture<'a, Result<Message, RemoteError>>;
}

/// HTTP client for the remote collection service.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RemoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Protocol {
                endpoint: base_url.to_string(),
                detail: "base URL cannot carry a path".to_string(),
            });
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RemoteClient { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL. A trailing `""` segment yields
    /// a trailing slash, which the collection routes require.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| RemoteError::Protocol {
                endpoint: self.base_url.to_string(),
                detail: "base URL cannot carry a path".to_string(),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

pub(crate) fn ensure_success(
    endpoint: &Url,
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Decodes a listing record by record. Records that do not decode are
/// logged and skipped so the rest of the collection still loads.
pub(crate) fn decode_records<T: DeserializeOwned>(endpoint: &Url, raw: Vec<serde_json::Value>) -> Vec<T> {
    let total = raw.len();
    let records: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping record {} from {}: {}", index, endpoint, e);
                None
            }
        })
        .collect();
    if records.len() < total {
        log::warn!("{} of {} records from {} could not be read.", total - records.len(), total, endpoint);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Photo;
    use serde_json::json;

    fn client(base: &str) -> RemoteClient {
        RemoteClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn collection_endpoints_keep_trailing_slash() {
        let url = client("http://localhost:8000").endpoint(&["photos", ""]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/photos/");
    }

    #[test]
    fn base_path_is_preserved_with_or_without_slash() {
        let with_slash = client("https://api.example.com/v1/").endpoint(&["messages", "7"]).unwrap();
        let without_slash = client("https://api.example.com/v1").endpoint(&["messages", "7"]).unwrap();

        assert_eq!(with_slash.as_str(), "https://api.example.com/v1/messages/7");
        assert_eq!(with_slash, without_slash);
    }

    #[test]
    fn record_ids_are_escaped_as_one_segment() {
        let url = client("http://localhost:8000").endpoint(&["photos", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/photos/a%2Fb%20c");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(RemoteClient::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
        assert!(RemoteClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn one_bad_record_does_not_sink_the_listing() {
        let endpoint = client("http://localhost:8000").endpoint(&["messages", ""]).unwrap();
        let raw = vec![
            json!({ "id": 1, "author": "Ana", "content": "Felicidades", "created_at": "2026-03-01T08:30:00Z" }),
            json!({ "id": 2, "author": "Leo", "created_at": "2026-03-01T09:00:00Z" }),
            json!({ "id": 3, "author": "Sara", "content": "Hola", "created_at": "ayer" }),
            json!({ "id": 4, "author": "Luis", "content": "Vivan los novios", "created_at": null }),
        ];

        let messages: Vec<Message> = decode_records(&endpoint, raw);

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn photo_listing_skips_records_without_url() {
        let endpoint = client("http://localhost:8000").endpoint(&["photos", ""]).unwrap();
        let raw = vec![
            json!({ "id": "p1", "url": "https://cdn.example.com/p1.jpg" }),
            json!({ "id": "p2" }),
        ];

        let photos: Vec<Photo> = decode_records(&endpoint, raw);

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id.as_str(), "p1");
    }
}
