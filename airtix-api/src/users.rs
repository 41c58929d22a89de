use airtix_core::user::{PasswordReset, ProfileUpdate, RegisterUser, UserProfile};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{customer_auth_middleware, CustomerClaims};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RecoverPasswordRequest {
    pub answer: String,
    pub password: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/users/me", get(get_profile).put(update_profile))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware));

    Router::new()
        .route("/v1/users", post(register))
        .route("/v1/users/{username}/security-question", get(security_question))
        .route("/v1/users/{username}/password", post(recover_password))
        .merge(protected)
}

/// POST /v1/users
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUser>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user_id = state.accounts.add_user(&req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user_id": user_id }))))
}

/// GET /v1/users/me
async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<UserProfile>, AppError> {
    let user_id = claims.user_id()?;
    state
        .accounts
        .get_user_info(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
}

/// PUT /v1/users/me
async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(mut req): Json<ProfileUpdate>,
) -> Result<StatusCode, AppError> {
    // The token decides whose profile changes.
    req.user_id = claims.user_id()?;
    state.accounts.update_user_detail(&req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/users/{username}/security-question
async fn security_question(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    let challenge = state
        .accounts
        .get_security_question(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}'", username)))?;

    Ok(Json(json!({ "question": challenge.question })))
}

/// POST /v1/users/{username}/password
async fn recover_password(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<RecoverPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let challenge = state
        .accounts
        .get_security_question(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}'", username)))?;

    if !challenge.accepts(&req.answer) {
        tracing::warn!("Wrong security answer for '{}'", username);
        return Err(AppError::Authorization("Security answer does not match".to_string()));
    }

    state
        .accounts
        .set_password(&PasswordReset {
            username,
            password: req.password,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
