//! Registered device endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::device::{AdminUpdateDevice, CreateDevice, Device, ReportIncident, UpdateDevice},
    AppState,
};

use super::AuthenticatedUser;

/// List the caller's devices (administrators: all devices)
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Device list", body = Vec<Device>)
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Device>>> {
    let devices = state.services.devices.list(&claims).await?;
    Ok(Json(devices))
}

/// Get device by ID
#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device details", body = Device),
        (status = 404, description = "Device not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.get(&claims, id).await?;
    Ok(Json(device))
}

/// Register a device
#[utoipa::path(
    post,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    request_body = CreateDevice,
    responses(
        (status = 201, description = "Device registered", body = Device),
        (status = 400, description = "Invalid device", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateDevice>,
) -> AppResult<(StatusCode, Json<Device>)> {
    let device = state.services.devices.create(&claims, &data).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Update descriptive device attributes
#[utoipa::path(
    put,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    request_body = UpdateDevice,
    responses(
        (status = 200, description = "Device updated", body = Device)
    )
)]
pub async fn update_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateDevice>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.update(&claims, id, &data).await?;
    Ok(Json(device))
}

/// Report a device lost or stolen
#[utoipa::path(
    post,
    path = "/devices/{id}/report",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    request_body = ReportIncident,
    responses(
        (status = 200, description = "Incident recorded", body = Device),
        (status = 400, description = "Invalid report", body = crate::error::ErrorResponse)
    )
)]
pub async fn report_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<ReportIncident>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.report(&claims, id, &data).await?;
    Ok(Json(device))
}

/// Mark a device as found
#[utoipa::path(
    post,
    path = "/devices/{id}/found",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device marked found", body = Device)
    )
)]
pub async fn mark_found(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.mark_found(&claims, id).await?;
    Ok(Json(device))
}

/// Administrator review of a device
#[utoipa::path(
    put,
    path = "/devices/{id}/admin",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    request_body = AdminUpdateDevice,
    responses(
        (status = 200, description = "Device updated", body = Device),
        (status = 403, description = "Administrator rights required", body = crate::error::ErrorResponse)
    )
)]
pub async fn admin_update_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<AdminUpdateDevice>,
) -> AppResult<Json<Device>> {
    let device = state.services.devices.admin_update(&claims, id, &data).await?;
    Ok(Json(device))
}

/// Delete a device
#[utoipa::path(
    delete,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Device ID")),
    responses(
        (status = 204, description = "Device deleted")
    )
)]
pub async fn delete_device(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.devices.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
