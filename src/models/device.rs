//! Registered device model and related types

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::tracking::Coordinates;

/// IMEI numbers are exactly 15 decimal digits
pub static IMEI_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{15}$").expect("valid IMEI regex"));

/// Owner-controlled lifecycle status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
    Lost,
    Stolen,
    Found,
    Recovered,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Lost => "lost",
            DeviceStatus::Stolen => "stolen",
            DeviceStatus::Found => "found",
            DeviceStatus::Recovered => "recovered",
        }
    }

    /// Lost and stolen devices are shown with the warning marker
    pub fn is_missing(&self) -> bool {
        matches!(self, DeviceStatus::Lost | DeviceStatus::Stolen)
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(DeviceStatus::Active),
            "lost" => Ok(DeviceStatus::Lost),
            "stolen" => Ok(DeviceStatus::Stolen),
            "found" => Ok(DeviceStatus::Found),
            "recovered" => Ok(DeviceStatus::Recovered),
            _ => Err(format!("Invalid device status: {}", s)),
        }
    }
}

/// Administrator-owned case status, independent of [`DeviceStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    #[default]
    Pending,
    Investigating,
    Resolved,
    Closed,
}

impl AdminStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminStatus::Pending => "pending",
            AdminStatus::Investigating => "investigating",
            AdminStatus::Resolved => "resolved",
            AdminStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for AdminStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AdminStatus::Pending),
            "investigating" => Ok(AdminStatus::Investigating),
            "resolved" => Ok(AdminStatus::Resolved),
            "closed" => Ok(AdminStatus::Closed),
            _ => Err(format!("Invalid admin status: {}", s)),
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Both statuses are stored as TEXT columns
macro_rules! text_column {
    ($ty:ty) => {
        impl sqlx::Type<Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                let s: String = self.as_str().to_string();
                <String as Encode<Postgres>>::encode(s, buf)
            }
        }
    };
}

text_column!(DeviceStatus);
text_column!(AdminStatus);

/// Row of the `registered_devices` table
///
/// `incident_latitude`/`incident_longitude` carry both the reported incident
/// position and the latest live or simulated position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Device {
    pub id: Uuid,
    /// Owner account (subject of the auth token)
    pub user_id: Uuid,
    pub device_name: String,
    pub imei_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub status: DeviceStatus,
    pub tracking_requested: bool,
    pub incident_latitude: Option<f64>,
    pub incident_longitude: Option<f64>,
    pub incident_location: Option<String>,
    pub incident_date: Option<DateTime<Utc>>,
    pub police_report_number: Option<String>,
    pub description: Option<String>,
    pub admin_status: AdminStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Current best-known position, present only when both axes are set
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.incident_latitude, self.incident_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    /// Merge the fields carried by `patch` into this device
    ///
    /// Fields absent from the patch are left untouched. Applying the same
    /// patch twice yields the same device.
    pub fn apply_patch(&mut self, patch: &DevicePatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &patch.$field {
                        self.$field = value.clone();
                    }
                )*
            };
        }

        merge!(
            user_id,
            device_name,
            imei_number,
            brand,
            model,
            color,
            serial_number,
            purchase_date,
            status,
            tracking_requested,
            incident_latitude,
            incident_longitude,
            incident_location,
            incident_date,
            police_report_number,
            description,
            admin_status,
            admin_notes,
            created_at,
            updated_at,
        );
    }
}

/// Partial device row carried by a realtime change
///
/// Outer `None` means "field not present", `Some(None)` an explicit null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePatch {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub imei_number: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub brand: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub model: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub color: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub purchase_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub tracking_requested: Option<bool>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub incident_latitude: Option<Option<f64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub incident_longitude: Option<Option<f64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub incident_location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub incident_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub police_report_number: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub admin_status: Option<AdminStatus>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub admin_notes: Option<Option<String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Register device request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDevice {
    #[validate(length(min = 1, message = "Device name is required"))]
    pub device_name: String,
    #[validate(regex(path = *IMEI_REGEX, message = "IMEI must be exactly 15 digits"))]
    pub imei_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

/// Update descriptive device attributes (owner only)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDevice {
    #[validate(length(min = 1, message = "Device name cannot be empty"))]
    pub device_name: Option<String>,
    #[validate(regex(path = *IMEI_REGEX, message = "IMEI must be exactly 15 digits"))]
    pub imei_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

/// Owner incident report (lost or stolen)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReportIncident {
    /// Must be `lost` or `stolen`
    pub status: DeviceStatus,
    #[validate(length(min = 1, message = "Incident location is required"))]
    pub incident_location: String,
    pub incident_date: DateTime<Utc>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    pub incident_latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    pub incident_longitude: Option<f64>,
    pub police_report_number: Option<String>,
    pub description: Option<String>,
}

impl ReportIncident {
    /// Checks that cannot be expressed as field attributes
    pub fn check(&self) -> Result<(), String> {
        if !self.status.is_missing() {
            return Err("Incident status must be lost or stolen".to_string());
        }
        if self.incident_latitude.is_some() != self.incident_longitude.is_some() {
            return Err("Latitude and longitude must be provided together".to_string());
        }
        Ok(())
    }
}

/// Administrator update
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUpdateDevice {
    pub admin_status: Option<AdminStatus>,
    pub admin_notes: Option<String>,
    /// Only `recovered` may be set by an administrator
    pub status: Option<DeviceStatus>,
}

/// Location fields written by the live tracker and the simulator
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

#[cfg(test)]
pub(crate) fn sample_device(id: Uuid, name: &str) -> Device {
    let now = Utc::now();
    Device {
        id,
        user_id: Uuid::nil(),
        device_name: name.to_string(),
        imei_number: "356938035643809".to_string(),
        brand: None,
        model: None,
        color: None,
        serial_number: None,
        purchase_date: None,
        status: DeviceStatus::Active,
        tracking_requested: false,
        incident_latitude: None,
        incident_longitude: None,
        incident_location: None,
        incident_date: None,
        police_report_number: None,
        description: None,
        admin_status: AdminStatus::Pending,
        admin_notes: None,
        created_at: now,
        updated_at: now,
    }
}
