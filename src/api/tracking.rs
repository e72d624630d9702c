//! Live tracker sessions and the track viewer

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{tracking::TrackingStatus, PositionSample},
    services::tracker::{ReportLocationError, StartTracking},
    tracking::{map_view::MapFrame, viewer::ViewerEvent},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityChange {
    pub visible: bool,
}

/// Start tracking a device
#[utoipa::path(
    post,
    path = "/tracking/sessions",
    tag = "tracking",
    security(("bearer_auth" = [])),
    request_body = StartTracking,
    responses(
        (status = 201, description = "Tracking started", body = TrackingStatus),
        (status = 400, description = "No device selected", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_session(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<StartTracking>,
) -> AppResult<(StatusCode, Json<TrackingStatus>)> {
    let status = state.services.tracker.start(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// Session state and activity log
#[utoipa::path(
    get,
    path = "/tracking/sessions/{id}",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = TrackingStatus),
        (status = 404, description = "Unknown session", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TrackingStatus>> {
    let status = state.services.tracker.status(&claims, id).await?;
    Ok(Json(status))
}

/// Forward a position fix from the tracker page
#[utoipa::path(
    post,
    path = "/tracking/sessions/{id}/positions",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = PositionSample,
    responses(
        (status = 202, description = "Fix accepted", body = TrackingStatus)
    )
)]
pub async fn push_position(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(sample): Json<PositionSample>,
) -> AppResult<(StatusCode, Json<TrackingStatus>)> {
    let status = state.services.tracker.push_position(&claims, id, sample).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Forward a geolocation error from the tracker page
#[utoipa::path(
    post,
    path = "/tracking/sessions/{id}/errors",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = ReportLocationError,
    responses(
        (status = 202, description = "Error recorded", body = TrackingStatus)
    )
)]
pub async fn push_error(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(report): Json<ReportLocationError>,
) -> AppResult<(StatusCode, Json<TrackingStatus>)> {
    let status = state.services.tracker.push_error(&claims, id, &report).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Page visibility changed
#[utoipa::path(
    post,
    path = "/tracking/sessions/{id}/visibility",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = VisibilityChange,
    responses(
        (status = 200, description = "Session state", body = TrackingStatus)
    )
)]
pub async fn visibility_changed(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(change): Json<VisibilityChange>,
) -> AppResult<Json<TrackingStatus>> {
    let status = state
        .services
        .tracker
        .visibility(&claims, id, change.visible)
        .await?;
    Ok(Json(status))
}

/// The platform released the page's screen wake lock
#[utoipa::path(
    post,
    path = "/tracking/sessions/{id}/wake-lock/released",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = TrackingStatus)
    )
)]
pub async fn wake_lock_released(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TrackingStatus>> {
    let status = state.services.tracker.wake_lock_released(&claims, id).await?;
    Ok(Json(status))
}

/// Stop tracking
#[utoipa::path(
    delete,
    path = "/tracking/sessions/{id}",
    tag = "tracking",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Tracking stopped", body = TrackingStatus)
    )
)]
pub async fn stop_session(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TrackingStatus>> {
    let status = state.services.tracker.stop(&claims, id).await?;
    Ok(Json(status))
}

/// Map frame of the caller's devices
#[utoipa::path(
    get,
    path = "/tracking/map",
    tag = "tracking",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Markers and viewport", body = MapFrame)
    )
)]
pub async fn get_map(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MapFrame>> {
    let frame = state.services.viewer.map_frame(&claims).await?;
    Ok(Json(frame))
}

type EventSender = mpsc::UnboundedSender<Result<Event, Infallible>>;

fn send_event<T: Serialize>(tx: &EventSender, name: &str, data: &T) {
    match serde_json::to_string(data) {
        Ok(json) => {
            let _ = tx.send(Ok(Event::default().event(name).data(json)));
        }
        Err(e) => tracing::warn!("Could not encode {} event: {}", name, e),
    }
}

/// Live device changes as Server-Sent Events
///
/// Emits `snapshot` once, then `device`, `notification` and `map` for every
/// merged change. A fresh `snapshot` follows whenever the viewer fell behind
/// the feed. Closing the stream ends the realtime subscription.
#[utoipa::path(
    get,
    path = "/tracking/stream",
    tag = "tracking",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Event stream", body = String, content_type = "text/event-stream")
    )
)]
pub async fn stream_updates(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Sse<UnboundedReceiverStream<Result<Event, Infallible>>>> {
    let (mut viewer, snapshot) = state.services.viewer.open(&claims).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    send_event(&tx, "snapshot", &snapshot);

    let viewers = state.services.viewer.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                event = viewer.next_event() => match event {
                    Some(ViewerEvent::Update(update)) => {
                        send_event(&tx, "device", &update.device);
                        send_event(&tx, "notification", &update.notification);
                        send_event(&tx, "map", &update.frame);
                    }
                    Some(ViewerEvent::Resync) => match viewers.reload(&mut viewer).await {
                        Ok(snapshot) => send_event(&tx, "snapshot", &snapshot),
                        Err(e) => {
                            tracing::error!("Track viewer resync failed for {}: {}", viewer.owner(), e);
                            break;
                        }
                    },
                    None => break,
                },
            }
        }
        tracing::info!("Track viewer closed for {}", viewer.owner());
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
