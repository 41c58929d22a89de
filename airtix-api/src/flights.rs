use airtix_core::flight::{Flight, FlightSearchQuery};
use airtix_core::FlightId;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights/search", get(search_flights))
        .route("/v1/flights/{flight_id}", get(get_flight))
}

/// GET /v1/flights/search?origin=DEL&destination=BOM
async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightSearchQuery>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state.admin.search_flights(&query.origin, &query.destination).await?;
    Ok(Json(flights))
}

/// GET /v1/flights/{flight_id}
pub(crate) async fn get_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<FlightId>,
) -> Result<Json<Flight>, AppError> {
    state
        .admin
        .get_flight(flight_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Flight {}", flight_id)))
}
