//! Process-wide caches of the remote photo and message collections.
//!
//! A `CollectionStore` is the only writer of its in-memory copy. Views read
//! snapshots; `load`/`refresh`, `add` and `remove` are the only mutations.
//! Reads from the service never fail outward (stale data is kept), while
//! deletes report failure to the caller and leave the cache untouched.

use crate::models::remote_operations::{CollectionRemote, RemoteError};
use crate::models::{CollectionRecord, Message, Photo, RecordId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type PhotoStore = CollectionStore<Photo>;
pub type MessageStore = CollectionStore<Message>;

pub struct CollectionStore<T: CollectionRecord> {
    records: RwLock<Vec<T>>,
    in_flight_loads: AtomicUsize,
    activated: AtomicBool,
    remote: Arc<dyn CollectionRemote<T>>,
}

/// Counts one load as in flight until dropped, so a load future abandoned
/// mid-await still clears the loading flag.
struct LoadInFlight<'a>(&'a AtomicUsize);

impl<'a> LoadInFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LoadInFlight(counter)
    }
}

impl Drop for LoadInFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn sort_newest_first<T: CollectionRecord>(records: &mut [T]) {
    // Stable, so a freshly prepended record stays ahead of equal timestamps.
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

impl<T: CollectionRecord> CollectionStore<T> {
    pub fn new(remote: Arc<dyn CollectionRemote<T>>) -> Self {
        CollectionStore {
            records: RwLock::new(Vec::new()),
            in_flight_loads: AtomicUsize::new(0),
            activated: AtomicBool::new(false),
            remote,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.records.read().unwrap_or_else(|poisoned| {
            log::error!("RwLock for {} store was poisoned! Using stale data.", T::KIND);
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.records.write().unwrap_or_else(|poisoned| {
            log::error!("RwLock for {} store was poisoned! Recovering lock.", T::KIND);
            poisoned.into_inner()
        })
    }

    /// Runs the initial `load` the first time the store is activated; later
    /// calls return immediately.
    pub async fn activate(&self) {
        if !self.activated.swap(true, Ordering::SeqCst) {
            self.load().await;
        }
    }

    /// Replaces the cache with the service's collection. On failure the
    /// previous contents are kept and the error is only logged.
    ///
    /// Overlapping loads are not coalesced: whichever completes last wins.
    pub async fn load(&self) {
        let _in_flight = LoadInFlight::enter(&self.in_flight_loads);
        let result = self.remote.fetch_all().await;
        match result {
            Ok(mut records) => {
                sort_newest_first(&mut records);
                log::info!("Loaded {} {} records.", records.len(), T::KIND);
                *self.write() = records;
            }
            Err(e) => {
                log::error!("Failed to load {} collection, keeping previous data: {}", T::KIND, e);
            }
        }
    }

    pub async fn refresh(&self) {
        self.load().await
    }

    /// Puts an already-persisted record at the head of the cache. No network call.
    pub fn add(&self, record: T) {
        let mut records = self.write();
        records.insert(0, record);
        sort_newest_first(&mut records);
    }

    /// Deletes on the service first; the cache only changes once that succeeds.
    pub async fn remove(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.remote.delete(id).await?;
        self.write().retain(|record| record.id() != id);
        log::info!("Removed {} '{}'.", T::KIND, id);
        Ok(())
    }

    /// Snapshot in display order, newest first.
    pub fn records(&self) -> Vec<T> {
        self.read().clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<T> {
        self.read().iter().find(|record| record.id() == id).cloned()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.read().iter().any(|record| record.id() == id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight_loads.load(Ordering::SeqCst) > 0
    }
}
