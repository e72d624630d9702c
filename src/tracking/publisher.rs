//! Persists positions as a device's last known location

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Coordinates, LocationUpdate, PositionSample},
    repository::DeviceStore,
};

/// Label written for a live tracker fix
pub fn live_location_label(sample: &PositionSample) -> String {
    format!(
        "Live Tracker: {:.5}, {:.5} (Accuracy: {}m)",
        sample.latitude,
        sample.longitude,
        sample.accuracy.round() as i64
    )
}

/// Label written for a simulator tick
pub fn simulated_location_label(position: &Coordinates) -> String {
    format!(
        "Simulated Location ({:.4}, {:.4})",
        position.latitude, position.longitude
    )
}

pub(crate) fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Writes location updates through a [`DeviceStore`]
///
/// Every call is an independent write: no batching, no retry and no offline
/// queue. A failed write is returned to the caller and the sample is lost.
#[derive(Clone)]
pub struct PositionPublisher {
    store: Arc<dyn DeviceStore>,
    timeout: Duration,
}

impl PositionPublisher {
    pub fn new(store: Arc<dyn DeviceStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Publish a live tracker fix for `device_id`
    pub async fn publish(&self, device_id: Uuid, sample: &PositionSample) -> AppResult<()> {
        let update = LocationUpdate {
            latitude: sample.latitude,
            longitude: sample.longitude,
            label: live_location_label(sample),
        };
        self.publish_update(device_id, &update).await
    }

    /// Write prepared location fields; shared by the tracker and the simulator
    pub async fn publish_update(&self, device_id: Uuid, update: &LocationUpdate) -> AppResult<()> {
        if !valid_coordinates(update.latitude, update.longitude) {
            return Err(AppError::Publish(format!(
                "Invalid coordinates {}, {}",
                update.latitude, update.longitude
            )));
        }

        match tokio::time::timeout(self.timeout, self.store.update_location(device_id, update)).await {
            Ok(Ok(())) => {
                tracing::debug!("Published location for device {}: {}", device_id, update.label);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!("Location publish for device {} failed: {}", device_id, e);
                Err(match e {
                    AppError::Publish(msg) => AppError::Publish(msg),
                    other => AppError::Publish(other.to_string()),
                })
            }
            Err(_) => {
                tracing::warn!("Location publish for device {} timed out", device_id);
                Err(AppError::Publish(format!(
                    "Timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
