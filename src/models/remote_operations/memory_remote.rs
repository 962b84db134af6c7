//! In-process stand-in for the remote collection service.
//!
//! Holds records and uploaded objects in memory, records every call in
//! order, and can be told to fail at any point of the contract.

use super::{CollectionRemote, MessageRemote, RemoteError, UploadRemote};
use crate::models::remote_models::{ConfirmPhoto, NewMessage, UploadFileSpec, UploadTarget};
use crate::models::{Message, Photo, PhotoPayload, RecordId};
use actix_web::web::Bytes;
use chrono::Utc;
use futures_util::future::{ready, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListPhotos,
    DeletePhoto(RecordId),
    Negotiate(Vec<UploadFileSpec>),
    Transfer { file_key: String, content_type: String, size: usize },
    Confirm(Vec<ConfirmPhoto>),
    ListMessages,
    CreateMessage(NewMessage),
    DeleteMessage(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ListPhotos,
    DeletePhoto,
    Negotiate,
    /// Transfer of the file with this name.
    Transfer(String),
    Confirm,
    ListMessages,
    CreateMessage,
    DeleteMessage,
}

#[derive(Default)]
pub struct MemoryRemote {
    photos: Mutex<Vec<Photo>>,
    messages: Mutex<Vec<Message>>,
    // write url -> (file key, file name)
    targets: Mutex<HashMap<String, (String, String)>>,
    objects: Mutex<HashMap<String, (String, Bytes)>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<HashSet<FailurePoint>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::error!("MemoryRemote mutex was poisoned! Recovering lock.");
        poisoned.into_inner()
    })
}

fn unavailable(endpoint: &str) -> RemoteError {
    RemoteError::Status { endpoint: endpoint.to_string(), status: 503 }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_photos(self, photos: Vec<Photo>) -> Self {
        *lock(&self.photos) = photos;
        self
    }

    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        *lock(&self.messages) = messages;
        self
    }

    pub fn fail(&self, point: FailurePoint) {
        lock(&self.failures).insert(point);
    }

    pub fn recover(&self, point: &FailurePoint) {
        lock(&self.failures).remove(point);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn photos(&self) -> Vec<Photo> {
        lock(&self.photos).clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    /// Content type and body stored under `file_key`, if it was transferred.
    pub fn stored_object(&self, file_key: &str) -> Option<(String, Bytes)> {
        lock(&self.objects).get(file_key).cloned()
    }

    fn record(&self, call: RemoteCall) {
        lock(&self.calls).push(call);
    }

    fn failing(&self, point: &FailurePoint) -> bool {
        lock(&self.failures).contains(point)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl CollectionRemote<Photo> for MemoryRemote {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Photo>, RemoteError>> {
        self.record(RemoteCall::ListPhotos);
        let result = if self.failing(&FailurePoint::ListPhotos) {
            Err(unavailable("/photos/"))
        } else {
            Ok(self.photos())
        };
        ready(result).boxed()
    }

    fn delete<'a>(&'a self, id: &'a RecordId) -> BoxFuture<'a, Result<(), RemoteError>> {
        self.record(RemoteCall::DeletePhoto(id.clone()));
        let result = if self.failing(&FailurePoint::DeletePhoto) {
            Err(unavailable("/photos/{id}"))
        } else {
            let mut photos = lock(&self.photos);
            let before = photos.len();
            photos.retain(|photo| &photo.id != id);
            if photos.len() == before {
                Err(RemoteError::Status { endpoint: format!("/photos/{}", id), status: 404 })
            } else {
                Ok(())
            }
        };
        ready(result).boxed()
    }
}

impl UploadRemote for MemoryRemote {
    fn generate_upload_urls<'a>(
        &'a self,
        files: &'a [UploadFileSpec],
    ) -> BoxFuture<'a, Result<Vec<UploadTarget>, RemoteError>> {
        self.record(RemoteCall::Negotiate(files.to_vec()));
        if self.failing(&FailurePoint::Negotiate) {
            return ready(Err(unavailable("/photos/generate-upload-url"))).boxed();
        }

        let mut targets = lock(&self.targets);
        let items = files
            .iter()
            .map(|file| {
                let file_key = format!("uploads/{}-{}", self.next_id(), file.file_name);
                let url = format!("https://storage.memory.local/{}?signature=once", file_key);
                targets.insert(url.clone(), (file_key.clone(), file.file_name.clone()));
                UploadTarget { url, file_key }
            })
            .collect();
        ready(Ok(items)).boxed()
    }

    fn transfer<'a>(
        &'a self,
        target: &'a UploadTarget,
        content_type: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        self.record(RemoteCall::Transfer {
            file_key: target.file_key.clone(),
            content_type: content_type.to_string(),
            size: body.len(),
        });

        // Write locations are one-time: consumed whether or not the transfer lands.
        let result = match lock(&self.targets).remove(&target.url) {
            None => Err(RemoteError::Status { endpoint: target.url.clone(), status: 403 }),
            Some((_, file_name)) if self.failing(&FailurePoint::Transfer(file_name.clone())) => {
                Err(unavailable(&target.url))
            }
            Some((file_key, _)) => {
                lock(&self.objects).insert(file_key, (content_type.to_string(), body));
                Ok(())
            }
        };
        ready(result).boxed()
    }

    fn confirm<'a>(
        &'a self,
        photos: &'a [ConfirmPhoto],
    ) -> BoxFuture<'a, Result<Vec<PhotoPayload>, RemoteError>> {
        self.record(RemoteCall::Confirm(photos.to_vec()));
        if self.failing(&FailurePoint::Confirm) {
            return ready(Err(unavailable("/photos/confirm"))).boxed();
        }

        let objects = lock(&self.objects);
        if let Some(missing) = photos.iter().find(|p| !objects.contains_key(&p.file_key)) {
            return ready(Err(RemoteError::Protocol {
                endpoint: "/photos/confirm".to_string(),
                detail: format!("no object stored under '{}'", missing.file_key),
            }))
            .boxed();
        }
        drop(objects);

        let created: Vec<Photo> = photos
            .iter()
            .map(|p| Photo {
                id: RecordId::new(self.next_id().to_string()),
                url: format!("https://storage.memory.local/{}", p.file_key),
                uploader_name: p.uploader_name.clone(),
                created_at: Utc::now(),
            })
            .collect();
        lock(&self.photos).extend(created.iter().cloned());

        let items = created
            .into_iter()
            .map(|photo| PhotoPayload {
                id: photo.id,
                url: photo.url,
                uploader_name: Some(photo.uploader_name),
                created_at: Some(photo.created_at),
            })
            .collect();
        ready(Ok(items)).boxed()
    }
}

impl CollectionRemote<Message> for MemoryRemote {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Message>, RemoteError>> {
        self.record(RemoteCall::ListMessages);
        let result = if self.failing(&FailurePoint::ListMessages) {
            Err(unavailable("/messages/"))
        } else {
            Ok(self.messages())
        };
        ready(result).boxed()
    }

    fn delete<'a>(&'a self, id: &'a RecordId) -> BoxFuture<'a, Result<(), RemoteError>> {
        self.record(RemoteCall::DeleteMessage(id.clone()));
        let result = if self.failing(&FailurePoint::DeleteMessage) {
            Err(unavailable("/messages/{id}"))
        } else {
            let mut messages = lock(&self.messages);
            let before = messages.len();
            messages.retain(|message| &message.id != id);
            if messages.len() == before {
                Err(RemoteError::Status { endpoint: format!("/messages/{}", id), status: 404 })
            } else {
                Ok(())
            }
        };
        ready(result).boxed()
    }
}

impl MessageRemote for MemoryRemote {
    fn create<'a>(&'a self, message: &'a NewMessage) -> BoxFuture<'a, Result<Message, RemoteError>> {
        self.record(RemoteCall::CreateMessage(message.clone()));
        let result = if self.failing(&FailurePoint::CreateMessage) {
            Err(unavailable("/messages/"))
        } else {
            let created = Message {
                id: RecordId::new(self.next_id().to_string()),
                author: message.author.clone(),
                content: message.content.clone(),
                created_at: Utc::now(),
            };
            lock(&self.messages).push(created.clone());
            Ok(created)
        };
        ready(result).boxed()
    }
}
