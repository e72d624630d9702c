//! Live tracker session
//!
//! [`TrackingSession`] is the explicit state of one tracker page:
//! `idle -> tracking -> idle`. Start and stop are methods on the value; the
//! platform capabilities are passed in. Every start and stop bumps a
//! generation counter so that callbacks belonging to an earlier watch (late
//! fixes, publish results still in flight) are dropped instead of mutating
//! the session.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::activity_log::ActivityLog;
use super::keep_awake::{KeepAwake, WakeLockId};
use super::location::{LocationSource, WatchId, WatchOptions};
use super::publisher::PositionPublisher;
use crate::{
    error::{AppError, AppResult, LocationError},
    models::{
        tracking::{TrackingState, TrackingStatus},
        LocationEvent, PositionSample,
    },
};

pub type Generation = u64;

/// Event stream of a started session, to be driven by [`spawn_watch`]
#[derive(Debug)]
pub struct StartedWatch {
    pub generation: Generation,
    pub device_id: Uuid,
    pub events: mpsc::UnboundedReceiver<LocationEvent>,
}

#[derive(Debug)]
pub struct TrackingSession {
    id: Uuid,
    device_id: Option<Uuid>,
    watch: Option<WatchId>,
    wake_lock: Option<WakeLockId>,
    is_active: bool,
    last_position: Option<PositionSample>,
    log: ActivityLog,
    generation: Generation,
}

impl TrackingSession {
    pub fn new(id: Uuid, log_capacity: usize) -> Self {
        Self {
            id,
            device_id: None,
            watch: None,
            wake_lock: None,
            is_active: false,
            last_position: None,
            log: ActivityLog::new(log_capacity),
            generation: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> Option<Uuid> {
        self.device_id
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// True while `generation` belongs to the running watch
    pub fn is_live(&self, generation: Generation) -> bool {
        self.is_active && self.generation == generation
    }

    /// Start tracking `device_id`
    ///
    /// A missing device is rejected before anything is touched. The wake lock
    /// is best effort and never prevents tracking from starting.
    pub async fn start(
        &mut self,
        device_id: Option<Uuid>,
        source: &dyn LocationSource,
        keep_awake: &dyn KeepAwake,
        options: &WatchOptions,
    ) -> AppResult<StartedWatch> {
        let device_id = device_id
            .ok_or_else(|| AppError::Validation("Please select a device to track".to_string()))?;

        if self.is_active {
            return Err(AppError::Conflict("Tracking is already active".to_string()));
        }

        let watch = match source.watch(options) {
            Ok(watch) => watch,
            Err(e) => {
                self.log.error(e.to_string());
                return Err(e.into());
            }
        };

        self.generation += 1;
        self.device_id = Some(device_id);
        self.watch = Some(watch.id);
        self.is_active = true;
        self.last_position = None;
        self.log.info(format!("Tracking started for device {}", device_id));
        tracing::info!("Session {} tracking device {}", self.id, device_id);

        self.wake_lock = keep_awake.acquire().await;
        if self.wake_lock.is_some() {
            self.log.success("Screen wake lock active");
        } else {
            self.log.warning("Screen wake lock unavailable, keep the screen on manually");
        }

        Ok(StartedWatch {
            generation: self.generation,
            device_id,
            events: watch.events,
        })
    }

    /// Stop tracking
    ///
    /// Clears the watch, releases the wake lock and logs the stop, each
    /// regardless of whether anything was running.
    pub async fn stop(&mut self, source: &dyn LocationSource, keep_awake: &dyn KeepAwake) {
        if let Some(watch) = self.watch.take() {
            source.clear_watch(watch);
        }
        if let Some(lock) = self.wake_lock.take() {
            keep_awake.release(lock).await;
        }
        if self.is_active {
            tracing::info!("Session {} stopped tracking", self.id);
        }
        self.is_active = false;
        self.generation += 1;
        self.log.info("Tracking stopped");
    }

    /// Record a fix; returns the device to publish to when the watch is live
    pub fn accept_fix(&mut self, generation: Generation, sample: PositionSample) -> Option<Uuid> {
        if !self.is_live(generation) {
            return None;
        }
        self.last_position = Some(sample);
        self.device_id
    }

    /// Log the outcome of a publish attempt; stale results are dropped
    pub fn record_publish(
        &mut self,
        generation: Generation,
        sample: &PositionSample,
        outcome: &AppResult<()>,
    ) {
        if !self.is_live(generation) {
            return;
        }
        match outcome {
            Ok(()) => self.log.success(format!(
                "Location sent: {:.6}, {:.6} (±{}m)",
                sample.latitude,
                sample.longitude,
                sample.accuracy.round() as i64
            )),
            Err(e) => self.log.error(format!("Failed to send location: {}", e)),
        }
    }

    /// Log a location error; the session stays active
    pub fn record_error(&mut self, generation: Generation, error: LocationError) {
        if !self.is_live(generation) {
            return;
        }
        tracing::warn!("Session {} location error: {:?}", self.id, error);
        self.log.error(error.to_string());
    }

    /// Re-acquire the wake lock when the page comes back to the foreground
    pub async fn on_visibility_change(&mut self, visible: bool, keep_awake: &dyn KeepAwake) {
        if !visible || !self.is_active || self.wake_lock.is_some() {
            return;
        }
        self.wake_lock = keep_awake.acquire().await;
        if self.wake_lock.is_some() {
            self.log.success("Screen wake lock re-acquired");
        }
    }

    /// The platform dropped a lock on its own
    pub fn on_wake_lock_released(&mut self, lock: WakeLockId) {
        if self.wake_lock == Some(lock) {
            self.wake_lock = None;
            self.log.warning("Screen wake lock released");
        }
    }

    pub fn status(&self) -> TrackingStatus {
        TrackingStatus {
            session_id: self.id,
            device_id: self.device_id,
            state: if self.is_active {
                TrackingState::Tracking
            } else {
                TrackingState::Idle
            },
            is_active: self.is_active,
            wake_lock_held: self.wake_lock.is_some(),
            last_position: self.last_position,
            activity_log: self.log.to_vec(),
        }
    }

    pub fn wake_lock(&self) -> Option<WakeLockId> {
        self.wake_lock
    }
}

/// Drive a started watch: publish every fix, log every error
///
/// Publishes are not serialized; a new fix may be published while an earlier
/// write is still pending. The task ends when the watch channel closes.
pub fn spawn_watch(
    session: Arc<Mutex<TrackingSession>>,
    started: StartedWatch,
    publisher: PositionPublisher,
) -> JoinHandle<()> {
    let StartedWatch {
        generation,
        mut events,
        ..
    } = started;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LocationEvent::Fix(sample) => {
                    let Some(device_id) = session.lock().await.accept_fix(generation, sample) else {
                        break;
                    };
                    let session = session.clone();
                    let publisher = publisher.clone();
                    tokio::spawn(async move {
                        let outcome = publisher.publish(device_id, &sample).await;
                        session
                            .lock()
                            .await
                            .record_publish(generation, &sample, &outcome);
                    });
                }
                LocationEvent::Error(error) => {
                    let mut session = session.lock().await;
                    if !session.is_live(generation) {
                        break;
                    }
                    session.record_error(generation, error);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tracking::LogLevel;
    use crate::tracking::testing::{FakeKeepAwake, FakeLocationSource, RecordingStore};
    use std::time::Duration;

    fn session() -> TrackingSession {
        TrackingSession::new(Uuid::new_v4(), 50)
    }

    fn sample() -> PositionSample {
        PositionSample { latitude: -22.5609, longitude: 17.0658, accuracy: 12.3 }
    }

    #[tokio::test]
    async fn test_start_without_device_is_rejected() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();

        let err = session
            .start(None, &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(source.watches_opened(), 0);
        assert_eq!(keep_awake.acquired(), 0);
        assert!(!session.is_active());
        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn test_start_opens_watch_and_wake_lock() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let device_id = Uuid::new_v4();

        let started = session
            .start(Some(device_id), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        assert_eq!(started.device_id, device_id);
        assert!(session.is_active());
        assert!(session.is_live(started.generation));
        assert_eq!(source.watches_opened(), 1);
        assert!(session.status().wake_lock_held);
        assert_eq!(session.status().state, TrackingState::Tracking);
    }

    #[tokio::test]
    async fn test_missing_wake_lock_does_not_block_tracking() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::unsupported();
        let mut session = session();

        session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        assert!(session.is_active());
        assert!(!session.status().wake_lock_held);
        assert_eq!(session.log().entries().next().map(|e| e.level), Some(LogLevel::Warning));
    }

    #[tokio::test]
    async fn test_unsupported_geolocation_fails_start() {
        let source = FakeLocationSource::unsupported();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();

        let err = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Location(LocationError::Unsupported)));
        assert!(!session.is_active());
        assert_eq!(keep_awake.acquired(), 0);
    }

    #[tokio::test]
    async fn test_stop_on_idle_session_is_harmless() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();

        session.stop(&source, &keep_awake).await;

        assert!(!session.is_active());
        assert_eq!(source.watches_cleared(), 0);
        assert_eq!(keep_awake.released(), 0);
        assert_eq!(
            session.log().entries().next().map(|e| e.message.as_str()),
            Some("Tracking stopped")
        );
    }

    #[tokio::test]
    async fn test_stop_clears_watch_and_releases_lock() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let started = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        session.stop(&source, &keep_awake).await;

        assert!(!session.is_active());
        assert!(!session.is_live(started.generation));
        assert_eq!(source.watches_cleared(), 1);
        assert_eq!(keep_awake.released(), 1);
        assert_eq!(session.watch_id(), None);
        assert_eq!(session.wake_lock(), None);
    }

    #[tokio::test]
    async fn test_location_error_keeps_session_active() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let started = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        session.record_error(started.generation, LocationError::Timeout);
        session.record_error(started.generation, LocationError::PermissionDenied);

        assert!(session.is_active());
        let top = session.log().entries().next().unwrap();
        assert_eq!(top.level, LogLevel::Error);
        assert!(top.message.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_session_active() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let started = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        let outcome = Err(AppError::Publish("network down".to_string()));
        session.record_publish(started.generation, &sample(), &outcome);

        assert!(session.is_active());
        let top = session.log().entries().next().unwrap();
        assert_eq!(top.level, LogLevel::Error);
        assert!(top.message.starts_with("Failed to send location"));
    }

    #[tokio::test]
    async fn test_stale_callbacks_after_stop_are_ignored() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let started = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();
        session.stop(&source, &keep_awake).await;
        let logged = session.log().len();

        assert_eq!(session.accept_fix(started.generation, sample()), None);
        session.record_publish(started.generation, &sample(), &Ok(()));
        session.record_error(started.generation, LocationError::Timeout);

        assert_eq!(session.log().len(), logged);
        assert_eq!(session.status().last_position, None);
    }

    #[tokio::test]
    async fn test_visibility_reacquires_released_lock() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        let lock = session.wake_lock().unwrap();
        session.on_wake_lock_released(lock);
        assert_eq!(session.wake_lock(), None);

        session.on_visibility_change(false, &keep_awake).await;
        assert_eq!(session.wake_lock(), None);

        session.on_visibility_change(true, &keep_awake).await;
        assert!(session.wake_lock().is_some());
        assert_eq!(keep_awake.acquired(), 2);

        // already held: no new lock
        session.on_visibility_change(true, &keep_awake).await;
        assert_eq!(keep_awake.acquired(), 2);
    }

    #[tokio::test]
    async fn test_visibility_ignored_while_idle() {
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        session.on_visibility_change(true, &keep_awake).await;
        assert_eq!(keep_awake.acquired(), 0);
    }

    #[tokio::test]
    async fn test_log_is_bounded_to_fifty_entries() {
        let source = FakeLocationSource::default();
        let keep_awake = FakeKeepAwake::supported();
        let mut session = session();
        let started = session
            .start(Some(Uuid::new_v4()), &source, &keep_awake, &WatchOptions::default())
            .await
            .unwrap();

        for _ in 0..80 {
            session.record_publish(started.generation, &sample(), &Ok(()));
        }
        session.record_error(started.generation, LocationError::Timeout);

        assert_eq!(session.log().len(), 50);
        assert_eq!(session.log().entries().next().map(|e| e.level), Some(LogLevel::Error));
    }

    #[tokio::test]
    async fn test_watch_runner_publishes_fixes() {
        let source = Arc::new(FakeLocationSource::default());
        let keep_awake = FakeKeepAwake::supported();
        let store = Arc::new(RecordingStore::default());
        let publisher = PositionPublisher::new(store.clone(), Duration::from_secs(5));
        let device_id = Uuid::new_v4();

        let session = Arc::new(Mutex::new(session()));
        let started = session
            .lock()
            .await
            .start(Some(device_id), source.as_ref(), &keep_awake, &WatchOptions::default())
            .await
            .unwrap();
        let watch_id = session.lock().await.watch_id().unwrap();
        let runner = spawn_watch(session.clone(), started, publisher);

        source.emit(watch_id, LocationEvent::Fix(sample()));
        source.emit(watch_id, LocationEvent::Error(LocationError::PositionUnavailable));
        // let the runner and the spawned publish settle
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let session = session.lock().await;
            let levels: Vec<_> = session.log().entries().map(|e| e.level).collect();
            assert!(levels.contains(&LogLevel::Success));
            assert_eq!(levels[0], LogLevel::Error);
            assert!(session.is_active());
        }

        session.lock().await.stop(source.as_ref(), &keep_awake).await;
        runner.await.unwrap();

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, device_id);
        assert_eq!(
            updates[0].1.label,
            "Live Tracker: -22.56090, 17.06580 (Accuracy: 12m)"
        );
        assert!(!session.lock().await.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_publish_is_logged_and_tracking_continues() {
        let source = Arc::new(FakeLocationSource::default());
        let keep_awake = FakeKeepAwake::supported();
        let store = Arc::new(RecordingStore::stalled());
        let publisher = PositionPublisher::new(store.clone(), Duration::from_secs(15));

        let session = Arc::new(Mutex::new(session()));
        let started = session
            .lock()
            .await
            .start(Some(Uuid::new_v4()), source.as_ref(), &keep_awake, &WatchOptions::default())
            .await
            .unwrap();
        let watch_id = session.lock().await.watch_id().unwrap();
        let _runner = spawn_watch(session.clone(), started, publisher);

        source.emit(watch_id, LocationEvent::Fix(sample()));
        tokio::time::sleep(Duration::from_secs(16)).await;

        let session = session.lock().await;
        assert!(session.is_active());
        let top = session.log().entries().next().unwrap();
        assert_eq!(top.level, LogLevel::Error);
        assert!(top.message.contains("Timed out"));
        assert!(store.updates().is_empty());
    }
}
