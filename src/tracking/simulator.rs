//! Simulated motion for devices without a live tracker
//!
//! A [`Simulator`] runs at most one random walk at a time. Starting a walk for
//! another device aborts the running one first. Unlike the live tracker, a
//! failed write ends the walk.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use super::publisher::{simulated_location_label, PositionPublisher};
use crate::{
    config::SimulationConfig,
    models::{tracking::SimulationStatus, Coordinates, Device, LocationUpdate},
};

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub interval: Duration,
    pub max_step: f64,
    pub fallback: Coordinates,
}

impl From<&SimulationConfig> for SimulationSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_step: config.max_step_degrees,
            fallback: Coordinates::new(config.fallback_latitude, config.fallback_longitude),
        }
    }
}

/// Starting point of a walk: the stored position, or the fallback
pub fn seed_position(device: &Device, fallback: Coordinates) -> Coordinates {
    device.coordinates().unwrap_or(fallback)
}

/// Move each axis independently by a uniform step in `[-max_step, max_step]`
///
/// Latitude stops at the poles and longitude wraps at the antimeridian, so
/// every step stays publishable.
pub fn perturb<R: Rng + ?Sized>(position: Coordinates, max_step: f64, rng: &mut R) -> Coordinates {
    let latitude = (position.latitude + rng.gen_range(-max_step..=max_step)).clamp(-90.0, 90.0);
    let mut longitude = position.longitude + rng.gen_range(-max_step..=max_step);
    if longitude > 180.0 {
        longitude -= 360.0;
    } else if longitude < -180.0 {
        longitude += 360.0;
    }
    Coordinates::new(latitude, longitude)
}

#[derive(Debug, Default)]
struct SimState {
    generation: u64,
    device_id: Option<Uuid>,
    task: Option<JoinHandle<()>>,
    current_position: Option<Coordinates>,
    last_error: Option<String>,
}

impl SimState {
    fn running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn status(&self) -> SimulationStatus {
        SimulationStatus {
            device_id: self.device_id,
            running: self.running(),
            current_position: self.current_position,
            last_error: self.last_error.clone(),
        }
    }
}

pub struct Simulator {
    publisher: PositionPublisher,
    settings: SimulationSettings,
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    pub fn new(publisher: PositionPublisher, settings: SimulationSettings) -> Self {
        Self {
            publisher,
            settings,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Start walking `device`, replacing any running walk
    pub fn start(&self, device: &Device) -> SimulationStatus {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = state.task.take() {
            task.abort();
            tracing::info!("Stopped simulation for device {:?}", state.device_id);
        }

        let seed = seed_position(device, self.settings.fallback);
        state.generation += 1;
        state.device_id = Some(device.id);
        state.current_position = Some(seed);
        state.last_error = None;
        state.task = Some(tokio::spawn(run_walk(
            self.publisher.clone(),
            self.settings.clone(),
            self.state.clone(),
            state.generation,
            device.id,
            seed,
        )));

        tracing::info!(
            "Simulating device {} from {:.5}, {:.5}",
            device.id,
            seed.latitude,
            seed.longitude
        );
        state.status()
    }

    pub fn stop(&self) -> SimulationStatus {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = state.task.take() {
            task.abort();
            tracing::info!("Stopped simulation for device {:?}", state.device_id);
        }
        state.generation += 1;
        state.status()
    }

    pub fn status(&self) -> SimulationStatus {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .status()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Some(task) = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .task
            .take()
        {
            task.abort();
        }
    }
}

async fn run_walk(
    publisher: PositionPublisher,
    settings: SimulationSettings,
    state: Arc<Mutex<SimState>>,
    generation: u64,
    device_id: Uuid,
    seed: Coordinates,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
    let mut current = seed;

    loop {
        ticker.tick().await;
        let next = perturb(current, settings.max_step, &mut rng);
        let update = LocationUpdate {
            latitude: next.latitude,
            longitude: next.longitude,
            label: simulated_location_label(&next),
        };

        let outcome = publisher.publish_update(device_id, &update).await;

        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        if state.generation != generation {
            break;
        }
        match outcome {
            Ok(()) => {
                current = next;
                state.current_position = Some(next);
            }
            Err(e) => {
                tracing::error!("Simulation for device {} stopped: {}", device_id, e);
                state.last_error = Some(e.to_string());
                state.task = None;
                break;
            }
        }
    }
}
