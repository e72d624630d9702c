//! Registered device service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        device::{AdminUpdateDevice, CreateDevice, ReportIncident, UpdateDevice},
        Device, DeviceStatus, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct DevicesService {
    repository: Repository,
}

impl DevicesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    /// Devices visible to the caller: their own, or all for administrators
    pub async fn list(&self, claims: &UserClaims) -> AppResult<Vec<Device>> {
        if claims.is_admin() {
            self.repository.devices_list_all().await
        } else {
            self.repository.devices_list_for_owner(claims.sub).await
        }
    }

    pub async fn get(&self, claims: &UserClaims, id: Uuid) -> AppResult<Device> {
        let device = self.repository.devices_get_by_id(id).await?;
        claims.require_owner(device.user_id)?;
        Ok(device)
    }

    pub async fn create(&self, claims: &UserClaims, data: &CreateDevice) -> AppResult<Device> {
        data.validate()?;
        let device = self.repository.devices_create(claims.sub, data).await?;
        tracing::info!("Device {} registered by {}", device.id, claims.sub);
        Ok(device)
    }

    pub async fn update(&self, claims: &UserClaims, id: Uuid, data: &UpdateDevice) -> AppResult<Device> {
        data.validate()?;
        self.get(claims, id).await?;
        self.repository.devices_update(id, data).await
    }

    /// Report a device lost or stolen and request tracking
    pub async fn report(&self, claims: &UserClaims, id: Uuid, data: &ReportIncident) -> AppResult<Device> {
        data.validate()?;
        data.check().map_err(AppError::Validation)?;
        self.get(claims, id).await?;
        let device = self.repository.devices_report_incident(id, data).await?;
        tracing::info!("Device {} reported {}", id, device.status);
        Ok(device)
    }

    pub async fn mark_found(&self, claims: &UserClaims, id: Uuid) -> AppResult<Device> {
        self.get(claims, id).await?;
        self.repository.devices_mark_found(id).await
    }

    pub async fn admin_update(
        &self,
        claims: &UserClaims,
        id: Uuid,
        data: &AdminUpdateDevice,
    ) -> AppResult<Device> {
        claims.require_admin()?;
        check_admin_status(data)?;
        self.repository.devices_admin_update(id, data).await
    }

    pub async fn delete(&self, claims: &UserClaims, id: Uuid) -> AppResult<()> {
        self.get(claims, id).await?;
        self.repository.devices_delete(id).await?;
        tracing::info!("Device {} deleted by {}", id, claims.sub);
        Ok(())
    }
}

/// Administrators may only move a device to `recovered`
fn check_admin_status(data: &AdminUpdateDevice) -> AppResult<()> {
    match data.status {
        None | Some(DeviceStatus::Recovered) => Ok(()),
        Some(other) => Err(AppError::Validation(format!(
            "Administrators cannot set status {}",
            other
        ))),
    }
}
