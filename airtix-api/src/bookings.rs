use airtix_core::booking::{BookingData, BookingReceipt, BookingRequest};
use airtix_core::pnr::Pnr;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::middleware::{customer_auth_middleware, CustomerClaims};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
struct CancellationResponse {
    pnr: Pnr,
    cancelled_legs: u64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_bookings).post(create_booking))
        .route("/v1/bookings/{pnr}", delete(cancel_booking))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let user_id = claims.user_id()?;
    let receipt = state
        .bookings
        .make_booking(&req.departure, req.return_flight.as_ref(), user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingData>>, AppError> {
    let user_id = claims.user_id()?;
    let bookings = state.bookings.get_booking_details_for_user(user_id).await?;
    Ok(Json(bookings))
}

/// DELETE /v1/bookings/{pnr}
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(pnr): Path<String>,
) -> Result<Json<CancellationResponse>, AppError> {
    let user_id = claims.user_id()?;
    let pnr = Pnr::parse(&pnr)?;

    // Someone else's PNR looks the same as an unknown one.
    match state.bookings.booking_owner(&pnr).await? {
        Some(owner) if owner == user_id => {}
        _ => return Err(AppError::NotFound(format!("Booking {}", pnr))),
    }

    let cancelled_legs = state.bookings.cancel_ticket(&pnr).await?;
    info!("User {} cancelled booking {}", user_id, pnr);
    Ok(Json(CancellationResponse { pnr, cancelled_legs }))
}
