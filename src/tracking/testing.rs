//! In-memory stand-ins for the platform and the data service

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::keep_awake::{KeepAwake, WakeLockId};
use super::location::{LocationSource, LocationWatch, WatchId, WatchOptions};
use crate::{
    error::{AppError, AppResult, LocationError},
    models::{LocationEvent, LocationUpdate},
    repository::DeviceStore,
};

#[derive(Default)]
pub struct FakeLocationSource {
    unsupported: bool,
    opened: AtomicUsize,
    cleared: AtomicUsize,
    senders: Mutex<HashMap<WatchId, mpsc::UnboundedSender<LocationEvent>>>,
}

impl FakeLocationSource {
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    pub fn emit(&self, id: WatchId, event: LocationEvent) {
        if let Some(sender) = self.senders.lock().unwrap().get(&id) {
            let _ = sender.send(event);
        }
    }

    pub fn watches_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn watches_cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl LocationSource for FakeLocationSource {
    fn watch(&self, _options: &WatchOptions) -> Result<LocationWatch, LocationError> {
        if self.unsupported {
            return Err(LocationError::Unsupported);
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst) as WatchId + 1;
        let (sender, events) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().insert(id, sender);
        Ok(LocationWatch { id, events })
    }

    fn clear_watch(&self, id: WatchId) {
        if self.senders.lock().unwrap().remove(&id).is_some() {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeKeepAwake {
    supported: bool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FakeKeepAwake {
    pub fn supported() -> Self {
        Self {
            supported: true,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::supported()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepAwake for FakeKeepAwake {
    async fn acquire(&self) -> Option<WakeLockId> {
        if !self.supported {
            return None;
        }
        Some(self.acquired.fetch_add(1, Ordering::SeqCst) as WakeLockId + 1)
    }

    async fn release(&self, _lock: WakeLockId) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store that records every location write
#[derive(Default)]
pub struct RecordingStore {
    failing: AtomicBool,
    stalled: AtomicBool,
    updates: Mutex<Vec<(Uuid, LocationUpdate)>>,
}

impl RecordingStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    /// Writes never complete
    pub fn stalled() -> Self {
        let store = Self::default();
        store.stalled.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(Uuid, LocationUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_for(&self, device_id: Uuid) -> Vec<LocationUpdate> {
        self.updates()
            .into_iter()
            .filter(|(id, _)| *id == device_id)
            .map(|(_, update)| update)
            .collect()
    }
}

#[async_trait]
impl DeviceStore for RecordingStore {
    async fn update_location(&self, device_id: Uuid, update: &LocationUpdate) -> AppResult<()> {
        if self.stalled.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("backend unreachable".to_string()));
        }
        self.updates.lock().unwrap().push((device_id, update.clone()));
        Ok(())
    }
}
