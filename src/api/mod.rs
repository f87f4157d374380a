mod error;
mod movies;
mod people;
mod tokens;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use movies::{PER_PAGE, Pagination, parse_rating_value};
pub use tokens::{REVOKED_TOKEN_MESSAGE, TokenObject, TokenResponse};
pub use users::{INCOMPLETE_CREDENTIALS, INVALID_CREDENTIALS, UsersState, parse_ttl, validate_dob};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    bcrypt_cost: u32,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        bcrypt_cost,
        rate_limit_config,
    };

    let tokens_state = tokens::TokensState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let people_state = people::PeopleState {
        db: db.clone(),
        jwt,
    };

    let movies_state = movies::MoviesState { db };

    Router::new()
        .nest(
            "/user",
            users::router(users_state).merge(tokens::router(tokens_state)),
        )
        .nest("/movies", movies::router(movies_state))
        .nest("/people", people::router(people_state))
}
