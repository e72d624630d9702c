//! Data models for the device tracker

pub mod device;
pub mod tracking;
pub mod user;

// Re-export commonly used types
pub use device::{AdminStatus, Device, DevicePatch, DeviceStatus, LocationUpdate};
pub use tracking::{Coordinates, LocationEvent, PositionSample};
pub use user::UserClaims;
