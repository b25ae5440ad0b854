use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rove_core::identity::{Caller, Role};
use crate::{error::AppError, state::{AppState, AuthConfig}};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub vendor_id: Option<Uuid>,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

/// Issue a short-lived customer token for an anonymous browser session.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let token = issue_token(&state.auth, Uuid::new_v4(), "CUSTOMER", None)?;
    Ok(Json(AuthResponse { token }))
}

pub fn issue_token(
    auth: &AuthConfig,
    user_id: Uuid,
    role: &str,
    vendor_id: Option<Uuid>,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        vendor_id,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

/// The `AuthorizeCaller` capability: bearer token in, verified caller out.
pub fn caller_from_token(state: &AppState, token: &str) -> Result<Caller, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    let claims = token_data.claims;
    let role = Role::parse(&claims.role)
        .ok_or_else(|| AppError::AuthorizationError(format!("Unknown role {}", claims.role)))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthenticationError("Malformed token subject".to_string()))?;

    Ok(Caller { user_id, role, vendor_id: claims.vendor_id })
}
