//! Device Tracker
//!
//! Registered device tracking server: live tracker sessions publish phone
//! positions as a device's last known location, a simulator produces the same
//! updates without GPS, and track viewers receive merged changes in realtime.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod tracking;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
