//! Per-location authoritative state.
//!
//! Each location gets its own async mutex. The router holds a location's
//! guard for the whole dispatch of a message, so messages for one location
//! run serially while different locations proceed in parallel.

use signage_core::{ContentPayload, LocationId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// What is currently selected and shown at one location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationState {
    pub current_library_item: Option<i64>,
    pub current_page: Option<i64>,
    pub current_playlist: Option<i64>,
    /// Last payload broadcast to displays; `None` after a blank clear.
    pub last_content: Option<ContentPayload>,
}

impl LocationState {
    pub fn set_library_selection(&mut self, item_id: i64, page: Option<i64>) {
        self.current_library_item = Some(item_id);
        self.current_page = page;
    }

    pub fn set_playlist_selection(&mut self, playlist_id: i64) {
        self.current_playlist = Some(playlist_id);
    }

    pub fn set_content(&mut self, payload: Option<ContentPayload>) {
        self.last_content = payload;
    }

    pub fn clear_library_selection(&mut self) {
        self.current_library_item = None;
        self.current_page = None;
    }
}

/// Lazily populated map of location records. Records are never removed;
/// the map is bounded by the number of physical locations.
#[derive(Default)]
pub struct LocationStateStore {
    locations: Mutex<HashMap<LocationId, Arc<AsyncMutex<LocationState>>>>,
}

impl LocationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `location`, created empty on first reference.
    pub fn get_or_create(&self, location: LocationId) -> Arc<AsyncMutex<LocationState>> {
        let mut locations = self.locations.lock().unwrap_or_else(|e| e.into_inner());
        locations
            .entry(location)
            .or_insert_with(|| {
                tracing::debug!(%location, "Location state created");
                Arc::new(AsyncMutex::new(LocationState::default()))
            })
            .clone()
    }

    /// Take exclusive access to a location's record.
    pub async fn lock(&self, location: LocationId) -> OwnedMutexGuard<LocationState> {
        self.get_or_create(location).lock_owned().await
    }

    /// Snapshot of a location's record. Never fails.
    pub async fn get(&self, location: LocationId) -> LocationState {
        self.lock(location).await.clone()
    }

    pub fn len(&self) -> usize {
        self.locations.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
