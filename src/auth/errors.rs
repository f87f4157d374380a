//! Authentication rejection type.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::jwt::VerifyError;

pub const MISSING_TOKEN_MESSAGE: &str = "Authorization header ('Bearer token') not found";
pub const EXPIRED_TOKEN_MESSAGE: &str = "JWT token has expired";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid JWT token";

/// Rejection produced when a required token fails verification.
/// Always 401; the message tells missing, expired and invalid apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthError(pub VerifyError);

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self.0 {
            VerifyError::Missing => MISSING_TOKEN_MESSAGE,
            VerifyError::Expired => EXPIRED_TOKEN_MESSAGE,
            VerifyError::Invalid => INVALID_TOKEN_MESSAGE,
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(e: VerifyError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: bool,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: true,
                message: self.message(),
            }),
        )
            .into_response()
    }
}
