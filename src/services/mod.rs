//! Business logic services

pub mod devices;
pub mod simulator;
pub mod tracker;
pub mod viewer;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::AppConfig,
    repository::Repository,
    tracking::{simulator::SimulationSettings, ChangeFeed, PositionPublisher},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub devices: devices::DevicesService,
    pub tracker: tracker::TrackerService,
    pub simulator: simulator::SimulatorService,
    pub viewer: viewer::ViewerService,
}

impl Services {
    /// Create all services with the given repository and change feed
    pub fn new(repository: Repository, config: &AppConfig, feed: Arc<ChangeFeed>) -> Self {
        let publisher = PositionPublisher::new(
            Arc::new(repository.clone()),
            Duration::from_secs(config.tracking.publish_timeout_secs),
        );

        Self {
            devices: devices::DevicesService::new(repository.clone()),
            tracker: tracker::TrackerService::new(
                repository.clone(),
                publisher.clone(),
                config.tracking.clone(),
            ),
            simulator: simulator::SimulatorService::new(
                repository.clone(),
                publisher,
                SimulationSettings::from(&config.simulation),
            ),
            viewer: viewer::ViewerService::new(repository, feed, config.map.clone()),
        }
    }
}
