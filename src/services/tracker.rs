//! Live tracker sessions opened by tracker pages

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::TrackingConfig,
    error::{AppError, AppResult, LocationError},
    models::{tracking::TrackingStatus, LocationEvent, PositionSample, UserClaims},
    repository::Repository,
    tracking::{
        session::spawn_watch, ClientKeepAwake, PositionPublisher, PushLocationSource,
        TrackingSession, WatchOptions,
    },
};

/// Start tracking request
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartTracking {
    pub device_id: Option<Uuid>,
    /// Whether the page can hold a screen wake lock
    #[serde(default)]
    pub wake_lock_supported: bool,
}

/// Geolocation failure forwarded by a tracker page
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportLocationError {
    pub kind: LocationError,
    /// Platform message, logged only
    pub message: Option<String>,
}

#[derive(Clone)]
struct SessionEntry {
    owner: Uuid,
    session: Arc<Mutex<TrackingSession>>,
    keep_awake: Arc<ClientKeepAwake>,
    /// Last call from the owning page
    last_seen: Arc<Mutex<Instant>>,
}

#[derive(Clone)]
pub struct TrackerService {
    repository: Repository,
    source: Arc<PushLocationSource>,
    publisher: PositionPublisher,
    config: TrackingConfig,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl TrackerService {
    pub fn new(repository: Repository, publisher: PositionPublisher, config: TrackingConfig) -> Self {
        Self {
            repository,
            source: Arc::new(PushLocationSource::new()),
            publisher,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a session and start tracking the selected device
    pub async fn start(&self, claims: &UserClaims, request: &StartTracking) -> AppResult<TrackingStatus> {
        let device_id = request
            .device_id
            .ok_or_else(|| AppError::Validation("Please select a device to track".to_string()))?;

        let device = self.repository.devices_get_by_id(device_id).await?;
        claims.require_owner(device.user_id)?;

        let status = self
            .open_session(claims.sub, device_id, request.wake_lock_supported)
            .await?;
        tracing::info!(
            "Tracking session {} opened by {} for device {}",
            status.session_id,
            claims.sub,
            device.device_name
        );
        Ok(status)
    }

    /// Register a tracking session for a device already checked against `owner`
    async fn open_session(&self, owner: Uuid, device_id: Uuid, wake_lock_supported: bool) -> AppResult<TrackingStatus> {
        let keep_awake = Arc::new(ClientKeepAwake::new(wake_lock_supported));
        let mut session = TrackingSession::new(Uuid::new_v4(), self.config.activity_log_capacity);
        let options = WatchOptions::with_timeout(Duration::from_millis(self.config.geolocation_timeout_ms));
        let started = session
            .start(Some(device_id), &*self.source, &*keep_awake, &options)
            .await?;

        let status = session.status();
        let session = Arc::new(Mutex::new(session));
        spawn_watch(session.clone(), started, self.publisher.clone());

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            status.session_id,
            SessionEntry {
                owner,
                session,
                keep_awake,
                last_seen: Arc::new(Mutex::new(Instant::now())),
            },
        );
        tracing::debug!("{} tracking sessions registered", sessions.len());
        Ok(status)
    }

    /// Stop and drop every session whose page has been silent for the idle
    /// timeout, stopped ones included
    ///
    /// Returns the number of sessions removed.
    pub async fn reap_stale(&self) -> usize {
        let timeout = Duration::from_secs(self.config.session_idle_timeout_secs);
        let now = Instant::now();

        let mut stale = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            let mut expired = Vec::new();
            for (id, entry) in sessions.iter() {
                if now.duration_since(*entry.last_seen.lock().await) >= timeout {
                    expired.push(*id);
                }
            }
            for id in expired {
                if let Some(entry) = sessions.remove(&id) {
                    stale.push((id, entry));
                }
            }
        }

        for (id, entry) in &stale {
            let mut session = entry.session.lock().await;
            if session.is_active() {
                session.stop(&*self.source, &*entry.keep_awake).await;
                tracing::warn!("Tracking session {} went silent and was stopped", id);
            }
        }
        if !stale.is_empty() {
            tracing::info!("Removed {} silent tracking sessions", stale.len());
        }
        stale.len()
    }

    /// Sweep silent sessions periodically
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let service = self.clone();
        let period = Duration::from_secs(self.config.reap_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                service.reap_stale().await;
            }
        })
    }

    async fn entry(&self, claims: &UserClaims, session_id: Uuid) -> AppResult<SessionEntry> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Tracking session {} not found", session_id)))?;
        claims.require_owner(entry.owner)?;
        *entry.last_seen.lock().await = Instant::now();
        Ok(entry)
    }

    /// Route one fix from the page into the session's watch
    ///
    /// Fixes arriving after stop are ignored.
    pub async fn push_position(
        &self,
        claims: &UserClaims,
        session_id: Uuid,
        sample: PositionSample,
    ) -> AppResult<TrackingStatus> {
        self.push(claims, session_id, LocationEvent::Fix(sample)).await
    }

    pub async fn push_error(
        &self,
        claims: &UserClaims,
        session_id: Uuid,
        report: &ReportLocationError,
    ) -> AppResult<TrackingStatus> {
        if let Some(message) = &report.message {
            tracing::debug!("Session {} platform error: {}", session_id, message);
        }
        self.push(claims, session_id, LocationEvent::Error(report.kind)).await
    }

    async fn push(&self, claims: &UserClaims, session_id: Uuid, event: LocationEvent) -> AppResult<TrackingStatus> {
        let entry = self.entry(claims, session_id).await?;
        let session = entry.session.lock().await;
        let delivered = match session.watch_id() {
            Some(watch) => self.source.push(watch, event),
            None => false,
        };
        if !delivered {
            tracing::debug!("Ignoring event for stopped session {}", session_id);
        }
        Ok(session.status())
    }

    pub async fn visibility(&self, claims: &UserClaims, session_id: Uuid, visible: bool) -> AppResult<TrackingStatus> {
        let entry = self.entry(claims, session_id).await?;
        let mut session = entry.session.lock().await;
        session.on_visibility_change(visible, &*entry.keep_awake).await;
        Ok(session.status())
    }

    /// The page's platform released the screen lock on its own
    pub async fn wake_lock_released(&self, claims: &UserClaims, session_id: Uuid) -> AppResult<TrackingStatus> {
        let entry = self.entry(claims, session_id).await?;
        let mut session = entry.session.lock().await;
        if let Some(lock) = session.wake_lock() {
            session.on_wake_lock_released(lock);
        }
        Ok(session.status())
    }

    pub async fn status(&self, claims: &UserClaims, session_id: Uuid) -> AppResult<TrackingStatus> {
        let entry = self.entry(claims, session_id).await?;
        let session = entry.session.lock().await;
        Ok(session.status())
    }

    /// Stop tracking; repeated stops succeed
    pub async fn stop(&self, claims: &UserClaims, session_id: Uuid) -> AppResult<TrackingStatus> {
        let entry = self.entry(claims, session_id).await?;
        let mut session = entry.session.lock().await;
        session.stop(&*self.source, &*entry.keep_awake).await;
        Ok(session.status())
    }
}
