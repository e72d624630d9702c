//! Simulated motion, one simulator per owner

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{tracking::SimulationStatus, UserClaims},
    repository::Repository,
    tracking::{simulator::SimulationSettings, PositionPublisher, Simulator},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSimulation {
    pub device_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct SimulatorService {
    repository: Repository,
    publisher: PositionPublisher,
    settings: SimulationSettings,
    simulators: Arc<Mutex<HashMap<Uuid, Arc<Simulator>>>>,
}

impl SimulatorService {
    pub fn new(repository: Repository, publisher: PositionPublisher, settings: SimulationSettings) -> Self {
        Self {
            repository,
            publisher,
            settings,
            simulators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn simulator_for(&self, owner: Uuid) -> Arc<Simulator> {
        self.simulators
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(owner)
            .or_insert_with(|| Arc::new(Simulator::new(self.publisher.clone(), self.settings.clone())))
            .clone()
    }

    fn existing(&self, owner: Uuid) -> Option<Arc<Simulator>> {
        self.simulators
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&owner)
            .cloned()
    }

    /// Start simulating a device; any running simulation of the owner stops first
    pub async fn start(&self, claims: &UserClaims, request: &StartSimulation) -> AppResult<SimulationStatus> {
        let device_id = request
            .device_id
            .ok_or_else(|| AppError::Validation("Please select a device to simulate".to_string()))?;
        let device = self.repository.devices_get_by_id(device_id).await?;
        claims.require_owner(device.user_id)?;

        Ok(self.simulator_for(claims.sub).start(&device))
    }

    pub fn status(&self, claims: &UserClaims) -> SimulationStatus {
        self.existing(claims.sub)
            .map(|simulator| simulator.status())
            .unwrap_or_else(idle_status)
    }

    pub fn stop(&self, claims: &UserClaims) -> SimulationStatus {
        self.existing(claims.sub)
            .map(|simulator| simulator.stop())
            .unwrap_or_else(idle_status)
    }
}

fn idle_status() -> SimulationStatus {
    SimulationStatus {
        device_id: None,
        running: false,
        current_position: None,
        last_error: None,
    }
}
