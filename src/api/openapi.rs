//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{devices, health, simulation, tracking};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Device Tracker API",
        version = "1.0.0",
        description = "Registered device tracking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Devices
        devices::list_devices,
        devices::get_device,
        devices::create_device,
        devices::update_device,
        devices::report_device,
        devices::mark_found,
        devices::admin_update_device,
        devices::delete_device,
        // Live tracker
        tracking::start_session,
        tracking::get_session,
        tracking::push_position,
        tracking::push_error,
        tracking::visibility_changed,
        tracking::wake_lock_released,
        tracking::stop_session,
        // Track viewer
        tracking::get_map,
        tracking::stream_updates,
        // Simulator
        simulation::start_simulation,
        simulation::get_simulation,
        simulation::stop_simulation,
    ),
    components(
        schemas(
            // Devices
            crate::models::device::Device,
            crate::models::device::DeviceStatus,
            crate::models::device::AdminStatus,
            crate::models::device::CreateDevice,
            crate::models::device::UpdateDevice,
            crate::models::device::ReportIncident,
            crate::models::device::AdminUpdateDevice,
            // Tracking
            crate::models::tracking::Coordinates,
            crate::models::tracking::PositionSample,
            crate::models::tracking::LogLevel,
            crate::models::tracking::ActivityEntry,
            crate::models::tracking::TrackingState,
            crate::models::tracking::TrackingStatus,
            crate::models::tracking::SimulationStatus,
            crate::services::tracker::StartTracking,
            crate::services::tracker::ReportLocationError,
            crate::services::simulator::StartSimulation,
            crate::error::LocationError,
            tracking::VisibilityChange,
            // Map
            crate::tracking::map_view::MarkerIcon,
            crate::tracking::map_view::Popup,
            crate::tracking::map_view::Marker,
            crate::tracking::map_view::Bounds,
            crate::tracking::map_view::FitBounds,
            crate::tracking::map_view::MapFrame,
            crate::tracking::viewer::ViewerSnapshot,
            crate::tracking::viewer::ViewerUpdate,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "devices", description = "Registered device management"),
        (name = "tracking", description = "Live tracking and track viewer"),
        (name = "simulation", description = "Simulated device motion")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
