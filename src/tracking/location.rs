//! Continuous position stream behind a small seam
//!
//! A [`LocationSource`] hands out watches. Each watch is an event channel that
//! delivers fixes and classified errors until the watch is cleared. Errors do
//! not end the stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::{error::LocationError, models::LocationEvent};

pub type WatchId = u64;

/// Options handed to the platform position watch
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WatchOptions {
    pub enable_high_accuracy: bool,
    /// Cached fixes older than this are not accepted
    pub maximum_age_ms: u64,
    /// Per-fix timeout; expiry is reported as [`LocationError::Timeout`]
    pub timeout_ms: u64,
}

impl WatchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            ..Self::default()
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: 10_000,
        }
    }
}

/// An open position watch
#[derive(Debug)]
pub struct LocationWatch {
    pub id: WatchId,
    pub events: mpsc::UnboundedReceiver<LocationEvent>,
}

pub trait LocationSource: Send + Sync {
    /// Open a new watch, or fail with [`LocationError::Unsupported`]
    fn watch(&self, options: &WatchOptions) -> Result<LocationWatch, LocationError>;

    /// Close a watch; unknown ids are ignored
    fn clear_watch(&self, id: WatchId);
}

/// Location source fed by a remote tracker page
///
/// The page runs the platform watch itself and forwards each fix or error,
/// which is routed to the matching watch channel with [`push`](Self::push).
#[derive(Default)]
pub struct PushLocationSource {
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, mpsc::UnboundedSender<LocationEvent>>>,
}

impl PushLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to a watch. Returns false when the watch is closed.
    pub fn push(&self, id: WatchId, event: LocationEvent) -> bool {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        match watches.get(&id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl LocationSource for PushLocationSource {
    fn watch(&self, options: &WatchOptions) -> Result<LocationWatch, LocationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, events) = mpsc::unbounded_channel();
        self.watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, sender);
        tracing::debug!(
            "Opened location watch {} (high accuracy: {}, timeout: {}ms)",
            id,
            options.enable_high_accuracy,
            options.timeout_ms
        );
        Ok(LocationWatch { id, events })
    }

    fn clear_watch(&self, id: WatchId) {
        if self
            .watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
        {
            tracing::debug!("Cleared location watch {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionSample;

    #[tokio::test]
    async fn test_push_reaches_open_watch() {
        let source = PushLocationSource::new();
        let mut watch = source.watch(&WatchOptions::default()).unwrap();

        let sample = PositionSample { latitude: 1.0, longitude: 2.0, accuracy: 5.0 };
        assert!(source.push(watch.id, LocationEvent::Fix(sample)));
        assert!(source.push(watch.id, LocationEvent::Error(LocationError::Timeout)));

        assert_eq!(watch.events.recv().await, Some(LocationEvent::Fix(sample)));
        assert_eq!(
            watch.events.recv().await,
            Some(LocationEvent::Error(LocationError::Timeout))
        );
    }

    #[tokio::test]
    async fn test_cleared_watch_closes_channel() {
        let source = PushLocationSource::new();
        let mut watch = source.watch(&WatchOptions::default()).unwrap();
        source.clear_watch(watch.id);

        assert!(!source.push(watch.id, LocationEvent::Error(LocationError::Timeout)));
        assert_eq!(watch.events.recv().await, None);
        assert_eq!(source.active_watches(), 0);

        // clearing twice is harmless
        source.clear_watch(watch.id);
    }

    #[test]
    fn test_default_options_request_fresh_high_accuracy_fixes() {
        let options = WatchOptions::with_timeout(Duration::from_secs(10));
        assert!(options.enable_high_accuracy);
        assert_eq!(options.maximum_age_ms, 0);
        assert_eq!(options.timeout_ms, 10_000);
    }
}
