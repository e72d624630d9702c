//! API handlers for the device tracker REST endpoints

pub mod devices;
pub mod health;
pub mod openapi;
pub mod simulation;
pub mod tracking;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        // Validate JWT token using the secret shared with the auth service
        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Devices
        .route("/devices", get(devices::list_devices).post(devices::create_device))
        .route(
            "/devices/:id",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route("/devices/:id/report", post(devices::report_device))
        .route("/devices/:id/found", post(devices::mark_found))
        .route("/devices/:id/admin", put(devices::admin_update_device))
        // Live tracker
        .route("/tracking/sessions", post(tracking::start_session))
        .route(
            "/tracking/sessions/:id",
            get(tracking::get_session).delete(tracking::stop_session),
        )
        .route("/tracking/sessions/:id/positions", post(tracking::push_position))
        .route("/tracking/sessions/:id/errors", post(tracking::push_error))
        .route("/tracking/sessions/:id/visibility", post(tracking::visibility_changed))
        .route(
            "/tracking/sessions/:id/wake-lock/released",
            post(tracking::wake_lock_released),
        )
        // Track viewer
        .route("/tracking/map", get(tracking::get_map))
        .route("/tracking/stream", get(tracking::stream_updates))
        // Simulator
        .route(
            "/simulation",
            get(simulation::get_simulation)
                .post(simulation::start_simulation)
                .delete(simulation::stop_simulation),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
