//! Registered device methods on Repository

use chrono::Utc;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::device::{
        AdminUpdateDevice, CreateDevice, Device, DeviceStatus, LocationUpdate, ReportIncident,
        UpdateDevice,
    },
};

impl Repository {
    /// List devices owned by a user, newest first
    pub async fn devices_list_for_owner(&self, user_id: Uuid) -> AppResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT * FROM registered_devices WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// List every device (administrators)
    pub async fn devices_list_all(&self) -> AppResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT * FROM registered_devices ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get device by ID
    pub async fn devices_get_by_id(&self, id: Uuid) -> AppResult<Device> {
        sqlx::query_as::<_, Device>("SELECT * FROM registered_devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Register a device for an owner
    pub async fn devices_create(&self, user_id: Uuid, data: &CreateDevice) -> AppResult<Device> {
        let row = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO registered_devices
                (user_id, device_name, imei_number, brand, model, color, serial_number, purchase_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&data.device_name)
        .bind(&data.imei_number)
        .bind(&data.brand)
        .bind(&data.model)
        .bind(&data.color)
        .bind(&data.serial_number)
        .bind(data.purchase_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Update descriptive attributes
    pub async fn devices_update(&self, id: Uuid, data: &UpdateDevice) -> AppResult<Device> {
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.device_name, "device_name");
        add_field!(data.imei_number, "imei_number");
        add_field!(data.brand, "brand");
        add_field!(data.model, "model");
        add_field!(data.color, "color");
        add_field!(data.serial_number, "serial_number");
        add_field!(data.purchase_date, "purchase_date");

        let query = format!(
            "UPDATE registered_devices SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Device>(&query).bind(Utc::now());

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.device_name);
        bind_field!(data.imei_number);
        bind_field!(data.brand);
        bind_field!(data.model);
        bind_field!(data.color);
        bind_field!(data.serial_number);
        bind_field!(data.purchase_date);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Record an incident and request tracking
    pub async fn devices_report_incident(&self, id: Uuid, data: &ReportIncident) -> AppResult<Device> {
        sqlx::query_as::<_, Device>(
            r#"
            UPDATE registered_devices SET
                status = $2,
                tracking_requested = TRUE,
                incident_location = $3,
                incident_date = $4,
                incident_latitude = $5,
                incident_longitude = $6,
                police_report_number = $7,
                description = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.status)
        .bind(&data.incident_location)
        .bind(data.incident_date)
        .bind(data.incident_latitude)
        .bind(data.incident_longitude)
        .bind(&data.police_report_number)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Owner marks the device found; the tracking request ends
    pub async fn devices_mark_found(&self, id: Uuid) -> AppResult<Device> {
        sqlx::query_as::<_, Device>(
            r#"
            UPDATE registered_devices SET
                status = $2,
                tracking_requested = FALSE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(DeviceStatus::Found)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Administrator status/notes update
    pub async fn devices_admin_update(&self, id: Uuid, data: &AdminUpdateDevice) -> AppResult<Device> {
        sqlx::query_as::<_, Device>(
            r#"
            UPDATE registered_devices SET
                admin_status = COALESCE($2, admin_status),
                admin_notes = COALESCE($3, admin_notes),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.admin_status)
        .bind(&data.admin_notes)
        .bind(data.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Overwrite the last known position of a device
    pub async fn devices_update_location(&self, id: Uuid, update: &LocationUpdate) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE registered_devices SET
                incident_latitude = $2,
                incident_longitude = $3,
                incident_location = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(&update.label)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", id)));
        }
        Ok(())
    }

    /// Delete a device (hard delete)
    pub async fn devices_delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM registered_devices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", id)));
        }
        Ok(())
    }
}
