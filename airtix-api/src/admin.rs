use airtix_core::flight::{Flight, NewFlight};
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::{error::AppError, flights, state::AppState};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/flights", get(list_flights).post(create_flight))
        .route("/v1/admin/flights/{flight_id}", get(flights::get_flight))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

/// GET /v1/admin/flights
async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    Ok(Json(state.admin.list_flights().await?))
}

/// POST /v1/admin/flights
async fn create_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Json(req): Json<NewFlight>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let flight_id = state.admin.add_flight(&req).await?;
    info!("Admin '{}' added flight {}", claims.sub, flight_id);
    Ok((StatusCode::CREATED, Json(json!({ "flight_id": flight_id }))))
}
