//! Repository layer for database operations

pub mod devices;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{error::AppResult, models::LocationUpdate};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Row writes needed by the live tracker and the simulator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Overwrite the location fields of a device and refresh `updated_at`
    async fn update_location(&self, device_id: Uuid, update: &LocationUpdate) -> AppResult<()>;
}

#[async_trait]
impl DeviceStore for Repository {
    async fn update_location(&self, device_id: Uuid, update: &LocationUpdate) -> AppResult<()> {
        self.devices_update_location(device_id, update).await
    }
}
