//! Token management API endpoints.
//!
//! - POST `/refresh` - Exchange a refresh token for a new access token
//! - POST `/logout` - Revoke a refresh token

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt, json_body};
use crate::auth::AuthError;
use crate::db::Database;
use crate::jwt::{Claims, JwtConfig, now_secs};

pub const REVOKED_TOKEN_MESSAGE: &str = "Refresh token has been revoked";

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

pub fn router(state: TokensState) -> Router {
    Router::new()
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct TokenObject {
    pub token_type: &'static str,
    pub token: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub bearer_token: TokenObject,
    pub refresh_token: TokenObject,
}

impl TokenResponse {
    pub fn new(access: &str, access_ttl: u64, refresh: &str, refresh_ttl: u64) -> Self {
        Self {
            bearer_token: TokenObject {
                token_type: "Bearer",
                token: access.to_string(),
                expires_in: access_ttl,
            },
            refresh_token: TokenObject {
                token_type: "Refresh",
                token: refresh.to_string(),
                expires_in: refresh_ttl,
            },
        }
    }
}

#[derive(Serialize)]
struct LogoutResponse {
    error: bool,
    message: &'static str,
}

/// Verify a refresh token and make sure it has not been revoked.
async fn active_refresh_claims(
    state: &TokensState,
    token: Option<&str>,
) -> Result<Claims, ApiError> {
    let claims = state.jwt.verify_refresh(token).map_err(AuthError)?;

    if state
        .db
        .revoked_tokens()
        .is_revoked(&claims.jti)
        .await
        .db_err("Failed to check token")?
    {
        return Err(ApiError::unauthorized(REVOKED_TOKEN_MESSAGE));
    }

    Ok(claims)
}

/// Mint a new access token from a valid refresh token.
/// The refresh token is returned unchanged.
async fn refresh_token(
    State(state): State<TokensState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let refresh_token = payload.refresh_token.as_deref();
    let claims = active_refresh_claims(&state, refresh_token).await?;

    let access = state.jwt.issue_access(&claims.email).map_err(|e| {
        error!(error = %e, "Failed to generate access token");
        ApiError::internal("Failed to generate token", e)
    })?;

    let now = now_secs().map_err(|e| ApiError::internal("Failed to generate token", e))?;
    let remaining = claims.exp.saturating_sub(now);

    Ok(Json(TokenResponse::new(
        &access.token,
        access.duration,
        refresh_token.unwrap_or_default(),
        remaining,
    )))
}

/// Revoke a refresh token. Outstanding access tokens stay valid until they
/// expire.
async fn logout(
    State(state): State<TokensState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let claims = active_refresh_claims(&state, payload.refresh_token.as_deref()).await?;

    state
        .db
        .revoked_tokens()
        .revoke(&claims.jti, &claims.email, claims.exp)
        .await
        .db_err("Failed to revoke token")?;

    info!(email = %claims.email, jti = %claims.jti, "Refresh token revoked");

    Ok(Json(LogoutResponse {
        error: false,
        message: "Token successfully invalidated",
    }))
}
