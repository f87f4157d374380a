//! Account and profile endpoints.
//!
//! - POST `/register` - Create an account
//! - POST `/login` - Exchange credentials for an access/refresh token pair
//! - GET `/{email}/profile` - Public profile, owner-only fields when authenticated as the owner
//! - PUT `/{email}/profile` - Owner updates their profile

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt, json_body};
use super::tokens::TokenResponse;
use crate::auth::{Auth, AuthError, OptionalAuth};
use crate::db::{Database, ProfileUpdate, User};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, MAX_TOKEN_DURATION_SECS};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

pub const INCOMPLETE_CREDENTIALS: &str =
    "Request body incomplete, both email and password are required";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_IN_USE: &str = "Email already in use!";
const INVALID_DOB: &str = "Invalid input: dob must be a real date in format YYYY-MM-DD.";
const DOB_NOT_IN_PAST: &str = "Invalid input: dob must be a date in the past.";

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub bcrypt_cost: u32,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let profile_router = Router::new()
        .route("/{email}/profile", get(get_profile).put(update_profile))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(register_router)
        .merge(profile_router)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CredentialsRequest {
    email: Option<String>,
    password: Option<String>,
    #[serde(rename = "bearerExpiresInSeconds")]
    bearer_expires_in_seconds: Option<Value>,
    #[serde(rename = "refreshExpiresInSeconds")]
    refresh_expires_in_seconds: Option<Value>,
}

impl CredentialsRequest {
    /// Email and password, both required to be non-empty.
    fn credentials(&self) -> Result<(&str, &str), ApiError> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok((email, password))
            }
            _ => Err(ApiError::bad_request(INCOMPLETE_CREDENTIALS)),
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    /// Outer `None` omits the field for non-owners
    #[serde(skip_serializing_if = "Option::is_none")]
    dob: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<Option<String>>,
}

impl ProfileResponse {
    fn public(user: User) -> Self {
        Self {
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            dob: None,
            address: None,
        }
    }

    fn owner(user: User) -> Self {
        Self {
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            dob: Some(user.dob),
            address: Some(user.address),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    first_name: Option<Value>,
    last_name: Option<Value>,
    dob: Option<Value>,
    address: Option<Value>,
}

// --- Handlers ---

async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let (email, password) = payload.credentials()?;

    if state
        .db
        .users()
        .exists(email)
        .await
        .db_err("Failed to check email availability")?
    {
        return Err(ApiError::bad_request(EMAIL_IN_USE));
    }

    let hash = hash_password(password, state.bcrypt_cost)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to hash password");
            ApiError::internal("Failed to hash password", e)
        })?;

    // A concurrent registration can win between the check above and here
    match state.db.users().create(email, &hash).await {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::bad_request(EMAIL_IN_USE));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    }

    info!(email = %email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created",
        }),
    ))
}

async fn login(
    State(state): State<UsersState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let (email, password) = payload.credentials()?;

    let user = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let valid = verify_password(password, &user.hash).await.map_err(|e| {
        error!(error = %e, "Failed to verify password");
        ApiError::internal("Authentication error", e)
    })?;

    if !valid {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let pair = state
        .jwt
        .issue(
            &user.email,
            parse_ttl(payload.bearer_expires_in_seconds.as_ref()),
            parse_ttl(payload.refresh_expires_in_seconds.as_ref()),
        )
        .map_err(|e| {
            error!(error = %e, "Failed to issue tokens");
            ApiError::internal("Failed to generate token", e)
        })?;

    info!(email = %user.email, "User logged in");

    Ok(Json(TokenResponse::new(
        &pair.access.token,
        pair.access.duration,
        &pair.refresh.token,
        pair.refresh.duration,
    )))
}

async fn get_profile(
    State(state): State<UsersState>,
    OptionalAuth(identity): OptionalAuth,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    let is_owner = identity.is_some_and(|i| i.email == email);

    Ok(Json(if is_owner {
        ProfileResponse::owner(user)
    } else {
        ProfileResponse::public(user)
    }))
}

/// Body validation runs before the credential check, so a malformed profile
/// is a 400 whether or not the caller is authenticated.
async fn update_profile(
    State(state): State<UsersState>,
    auth: Result<Auth, AuthError>,
    Path(email): Path<String>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let update = validate_profile(&payload, chrono::Utc::now().date_naive())?;

    let Auth(identity) = auth?;
    if identity.email != email {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let updated = state
        .db
        .users()
        .update_profile(&email, &update)
        .await
        .db_err("Failed to update profile")?;

    if !updated {
        return Err(ApiError::not_found("User not found."));
    }

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    info!(email = %email, "Profile updated");

    Ok(Json(ProfileResponse::owner(user)))
}

// --- Validation ---

/// Parse a token lifetime override. Accepts positive integers up to
/// [`MAX_TOKEN_DURATION_SECS`] given as JSON numbers or as strings with a
/// leading integer; anything else means "use the default".
pub fn parse_ttl(value: Option<&Value>) -> Option<u64> {
    let secs = match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }?;
    (1..=MAX_TOKEN_DURATION_SECS).contains(&secs).then_some(secs)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn validate_profile(req: &UpdateProfileRequest, today: NaiveDate) -> Result<ProfileUpdate, ApiError> {
    let fields = [&req.first_name, &req.last_name, &req.dob, &req.address];
    if fields.iter().any(|f| is_blank(f.as_ref())) {
        return Err(ApiError::bad_request(
            "Request body incomplete: firstName, lastName, dob and address are required.",
        ));
    }

    let (Some(Value::String(first_name)), Some(Value::String(last_name)), Some(Value::String(address))) =
        (&req.first_name, &req.last_name, &req.address)
    else {
        return Err(ApiError::bad_request(
            "Request body invalid: firstName, lastName and address must be strings only.",
        ));
    };

    let Some(Value::String(dob)) = &req.dob else {
        return Err(ApiError::bad_request(INVALID_DOB));
    };
    validate_dob(dob, today)?;

    Ok(ProfileUpdate {
        first_name: first_name.clone(),
        last_name: last_name.clone(),
        dob: dob.clone(),
        address: address.clone(),
    })
}

/// `dob` must be exactly `YYYY-MM-DD`, a real calendar date, and strictly
/// before `today`.
pub fn validate_dob(dob: &str, today: NaiveDate) -> Result<NaiveDate, ApiError> {
    let bytes = dob.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(ApiError::bad_request(INVALID_DOB));
    }

    let date = NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(INVALID_DOB))?;

    if date >= today {
        return Err(ApiError::bad_request(DOB_NOT_IN_PAST));
    }

    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            _ => panic!("expected a bad request"),
        }
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl(None), None);
        assert_eq!(parse_ttl(Some(&json!(30))), Some(30));
        assert_eq!(parse_ttl(Some(&json!("45"))), Some(45));
        assert_eq!(parse_ttl(Some(&json!("45abc"))), Some(45));
        assert_eq!(parse_ttl(Some(&json!(12.7))), Some(12));
        assert_eq!(parse_ttl(Some(&json!(0))), None);
        assert_eq!(parse_ttl(Some(&json!(-5))), None);
        assert_eq!(parse_ttl(Some(&json!("soon"))), None);
        assert_eq!(parse_ttl(Some(&json!(true))), None);
        assert_eq!(parse_ttl(Some(&Value::Null)), None);
        assert_eq!(
            parse_ttl(Some(&json!(MAX_TOKEN_DURATION_SECS))),
            Some(MAX_TOKEN_DURATION_SECS)
        );
        assert_eq!(parse_ttl(Some(&json!(MAX_TOKEN_DURATION_SECS + 1))), None);
        assert_eq!(parse_ttl(Some(&json!(u64::MAX))), None);
        assert_eq!(parse_ttl(Some(&json!(1e300))), None);
        assert_eq!(parse_ttl(Some(&json!("99999999999999999999"))), None);
    }

    #[test]
    fn test_validate_dob_accepts_past_date() {
        let date = validate_dob("1990-02-28", today()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1990, 2, 28).unwrap());
    }

    #[test]
    fn test_validate_dob_rejects_bad_format() {
        for dob in ["1990-2-28", "90-02-28", "1990/02/28", "1990-02-28T00:00", "abcd-ef-gh"] {
            assert_eq!(message(validate_dob(dob, today()).unwrap_err()), INVALID_DOB);
        }
    }

    #[test]
    fn test_validate_dob_rejects_impossible_date() {
        assert_eq!(message(validate_dob("2023-02-30", today()).unwrap_err()), INVALID_DOB);
        assert_eq!(message(validate_dob("2023-13-01", today()).unwrap_err()), INVALID_DOB);
        // 2023 is not a leap year
        assert_eq!(message(validate_dob("2023-02-29", today()).unwrap_err()), INVALID_DOB);
        assert!(validate_dob("2020-02-29", today()).is_ok());
    }

    #[test]
    fn test_validate_dob_must_be_in_past() {
        assert_eq!(message(validate_dob("2999-01-01", today()).unwrap_err()), DOB_NOT_IN_PAST);
        assert_eq!(message(validate_dob("2024-06-15", today()).unwrap_err()), DOB_NOT_IN_PAST);
        assert!(validate_dob("2024-06-14", today()).is_ok());
    }

    #[test]
    fn test_validate_profile_incomplete() {
        let req = UpdateProfileRequest {
            first_name: Some(json!("Alice")),
            last_name: Some(json!("")),
            dob: Some(json!("1990-01-01")),
            address: Some(json!("1 Street")),
        };
        assert!(message(validate_profile(&req, today()).unwrap_err()).contains("incomplete"));
    }

    #[test]
    fn test_validate_profile_non_string() {
        let req = UpdateProfileRequest {
            first_name: Some(json!("Alice")),
            last_name: Some(json!("Liddell")),
            dob: Some(json!("1990-01-01")),
            address: Some(json!(42)),
        };
        assert!(message(validate_profile(&req, today()).unwrap_err()).contains("strings only"));
    }

    #[test]
    fn test_validate_profile_ok() {
        let req = UpdateProfileRequest {
            first_name: Some(json!("Alice")),
            last_name: Some(json!("Liddell")),
            dob: Some(json!("1990-01-01")),
            address: Some(json!("1 Street")),
        };
        let update = validate_profile(&req, today()).unwrap();
        assert_eq!(update.first_name, "Alice");
        assert_eq!(update.dob, "1990-01-01");
    }
}
