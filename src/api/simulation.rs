//! Simulator endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::tracking::SimulationStatus,
    services::simulator::StartSimulation,
    AppState,
};

use super::AuthenticatedUser;

/// Start simulated motion for a device
#[utoipa::path(
    post,
    path = "/simulation",
    tag = "simulation",
    security(("bearer_auth" = [])),
    request_body = StartSimulation,
    responses(
        (status = 200, description = "Simulation started", body = SimulationStatus),
        (status = 400, description = "No device selected", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_simulation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<StartSimulation>,
) -> AppResult<Json<SimulationStatus>> {
    let status = state.services.simulator.start(&claims, &request).await?;
    Ok(Json(status))
}

/// Current simulation
#[utoipa::path(
    get,
    path = "/simulation",
    tag = "simulation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Simulation status", body = SimulationStatus)
    )
)]
pub async fn get_simulation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Json<SimulationStatus> {
    Json(state.services.simulator.status(&claims))
}

/// Stop the running simulation
#[utoipa::path(
    delete,
    path = "/simulation",
    tag = "simulation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Simulation stopped", body = SimulationStatus)
    )
)]
pub async fn stop_simulation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Json<SimulationStatus> {
    Json(state.services.simulator.stop(&claims))
}
