//! Value types shared by the tracker, simulator and map

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LocationError;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One fix from a location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
}

impl PositionSample {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Something a location watch delivers
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(PositionSample),
    Error(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of a tracker session's activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Lifecycle state of a tracker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Idle,
    Tracking,
}

/// Snapshot of a tracker session returned to the tracker page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackingStatus {
    pub session_id: Uuid,
    pub device_id: Option<Uuid>,
    pub state: TrackingState,
    pub is_active: bool,
    /// Whether the page should currently hold a screen wake lock
    pub wake_lock_held: bool,
    pub last_position: Option<PositionSample>,
    /// Most recent entry first
    pub activity_log: Vec<ActivityEntry>,
}

/// Snapshot of the simulator returned to the simulator page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulationStatus {
    pub device_id: Option<Uuid>,
    pub running: bool,
    pub current_position: Option<Coordinates>,
    pub last_error: Option<String>,
}
