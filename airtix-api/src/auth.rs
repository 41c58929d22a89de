use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::middleware::auth::{AdminClaims, CustomerClaims, ADMIN_ROLE, CUSTOMER_ROLE};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct CustomerAuthResponse {
    token: String,
    user_id: i32,
}

#[derive(Debug, Serialize)]
struct AdminAuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/login", post(login_customer))
        .route("/v1/admin/login", post(login_admin))
}

fn expiry(state: &AppState) -> usize {
    (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize
}

fn sign<T: Serialize>(state: &AppState, claims: &T) -> Result<String, AppError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(state.auth.secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

async fn login_customer(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<CustomerAuthResponse>, AppError> {
    let user_id = state
        .accounts
        .validate_user_info(&req.username, &req.password)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

    let claims = CustomerClaims {
        sub: user_id.to_string(),
        role: CUSTOMER_ROLE.to_owned(),
        exp: expiry(&state),
    };
    let token = sign(&state, &claims)?;

    Ok(Json(CustomerAuthResponse { token, user_id }))
}

async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AdminAuthResponse>, AppError> {
    if !state.admin.validate_admin_cred(&req.username, &req.password).await? {
        return Err(AppError::Authentication("Invalid admin credentials".to_string()));
    }

    let claims = AdminClaims {
        sub: req.username.trim().to_string(),
        role: ADMIN_ROLE.to_owned(),
        exp: expiry(&state),
    };
    let token = sign(&state, &claims)?;

    Ok(Json(AdminAuthResponse { token }))
}
