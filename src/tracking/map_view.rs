//! Tracking map model
//!
//! Turns the device list into markers and decides when the viewport has to be
//! refitted. Rendering itself belongs to the page.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::MapConfig,
    models::{Coordinates, Device, DeviceStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarkerIcon {
    Warning,
    Default,
}

impl MarkerIcon {
    pub fn for_status(status: DeviceStatus) -> Self {
        if status.is_missing() {
            MarkerIcon::Warning
        } else {
            MarkerIcon::Default
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            MarkerIcon::Warning => "red",
            MarkerIcon::Default => "blue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Popup {
    pub device_name: String,
    pub status: DeviceStatus,
    pub location: Option<String>,
    /// Raw coordinates, six decimals
    pub coordinates: String,
    /// Outbound link to an external map service
    pub map_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Marker {
    pub device_id: Uuid,
    pub position: Coordinates,
    pub icon: MarkerIcon,
    pub color: String,
    pub popup: Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

impl Bounds {
    /// Smallest box containing every point; `None` for no points
    pub fn around<'a>(points: impl IntoIterator<Item = &'a Coordinates>) -> Option<Self> {
        points.into_iter().fold(None, |bounds: Option<Bounds>, p| {
            Some(match bounds {
                None => Bounds { south_west: *p, north_east: *p },
                Some(b) => Bounds {
                    south_west: Coordinates::new(
                        b.south_west.latitude.min(p.latitude),
                        b.south_west.longitude.min(p.longitude),
                    ),
                    north_east: Coordinates::new(
                        b.north_east.latitude.max(p.latitude),
                        b.north_east.longitude.max(p.longitude),
                    ),
                },
            })
        })
    }
}

/// Instruction to animate the viewport onto `bounds`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct FitBounds {
    pub bounds: Bounds,
    pub padding_px: u32,
    pub max_zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapFrame {
    /// Initial camera position
    pub center: Coordinates,
    pub zoom: u8,
    pub markers: Vec<Marker>,
    /// Present only when the marker set changed since the last fit
    pub fit: Option<FitBounds>,
}

pub fn external_map_url(position: &Coordinates) -> String {
    format!(
        "https://www.google.com/maps?q={},{}",
        position.latitude, position.longitude
    )
}

pub fn marker_for(device: &Device) -> Option<Marker> {
    let position = device.coordinates()?;
    let icon = MarkerIcon::for_status(device.status);
    Some(Marker {
        device_id: device.id,
        position,
        icon,
        color: icon.color().to_string(),
        popup: Popup {
            device_name: device.device_name.clone(),
            status: device.status,
            location: device.incident_location.clone(),
            coordinates: format!("{:.6}, {:.6}", position.latitude, position.longitude),
            map_url: external_map_url(&position),
        },
    })
}

/// Map state of one viewer: remembers the marker set it last fitted to
#[derive(Debug, Clone)]
pub struct TrackingMap {
    config: MapConfig,
    fitted: Vec<(Uuid, Coordinates)>,
}

impl TrackingMap {
    pub fn new(config: MapConfig) -> Self {
        Self {
            config,
            fitted: Vec::new(),
        }
    }

    /// Build the frame for `devices`; only devices with both coordinates
    /// produce a marker
    pub fn render<'a>(&mut self, devices: impl IntoIterator<Item = &'a Device>) -> MapFrame {
        let markers: Vec<Marker> = devices.into_iter().filter_map(marker_for).collect();
        let points: Vec<(Uuid, Coordinates)> =
            markers.iter().map(|m| (m.device_id, m.position)).collect();

        let fit = if points != self.fitted {
            self.fitted = points;
            Bounds::around(self.fitted.iter().map(|(_, p)| p)).map(|bounds| FitBounds {
                bounds,
                padding_px: self.config.padding_px,
                max_zoom: self.config.max_zoom,
            })
        } else {
            None
        };

        MapFrame {
            center: Coordinates::new(self.config.default_latitude, self.config.default_longitude),
            zoom: self.config.default_zoom,
            markers,
            fit,
        }
    }
}
