//! People endpoint. Requires a valid access token.
//!
//! - GET `/{id}` - Person with every role they played

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt, parse_string_list, reject_query};
use super::movies::leading_number;
use crate::auth::Auth;
use crate::db::{Database, Role};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct PeopleState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(PeopleState);

pub fn router(state: PeopleState) -> Router {
    Router::new()
        .route("/{id}", get(get_person))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleResponse {
    movie_name: Option<String>,
    movie_id: String,
    category: Option<String>,
    characters: Vec<String>,
    imdb_rating: Option<f64>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            characters: parse_string_list(r.characters.as_deref()),
            imdb_rating: r.imdb_rating.as_deref().and_then(leading_number),
            movie_name: r.movie_name,
            movie_id: r.movie_id,
            category: r.category,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonResponse {
    name: Option<String>,
    birth_year: Option<i64>,
    death_year: Option<i64>,
    roles: Vec<RoleResponse>,
}

async fn get_person(
    State(state): State<PeopleState>,
    Auth(_identity): Auth,
    Path(id): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    reject_query(raw_query.as_deref())?;

    let people = state.db.people();
    let person = people
        .get(&id)
        .await
        .db_err("Failed to get person")?
        .ok_or_else(|| ApiError::not_found("No record exists of a person with this ID"))?;

    let roles = people.roles(&id).await.db_err("Failed to get roles")?;

    Ok(Json(PersonResponse {
        name: person.name,
        // Zero is the catalogue's "unknown" marker
        birth_year: person.birth_year.filter(|y| *y != 0),
        death_year: person.death_year.filter(|y| *y != 0),
        roles: roles.into_iter().map(RoleResponse::from).collect(),
    }))
}
