//! Axum extractors for the two request-filtering policies.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use super::bearer::bearer_token;
use super::errors::AuthError;
use super::state::HasAuthBackend;

/// Identity bound to a request by a verified access token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
}

fn authenticate<S: HasAuthBackend>(parts: &Parts, state: &S) -> Result<Identity, AuthError> {
    let claims = state.jwt().verify_access(bearer_token(&parts.headers))?;
    Ok(Identity { email: claims.email })
}

/// Required policy: rejects with 401 unless a valid access token is present.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).inspect_err(|e| {
            tracing::debug!(path = %parts.uri.path(), reason = e.message(), "Rejected token");
        })?;
        Ok(Auth(identity))
    }
}

/// Optional policy: never rejects. Any verification failure, including a
/// missing header, binds `None`.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate(parts, state).ok()))
    }
}
