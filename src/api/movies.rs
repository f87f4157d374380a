//! Movie catalogue endpoints. Public, no authentication.
//!
//! - GET `/search` - Paginated title/year search
//! - GET `/data/{imdb_id}` - Full movie record with principals and ratings

use axum::{
    Json, Router,
    extract::{Path, Query, RawQuery, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ApiError, ResultExt, parse_string_list, reject_query};
use crate::db::{Database, MovieFilter, MovieSummary, Principal, Rating};

/// Search results per page.
pub const PER_PAGE: i64 = 100;

#[derive(Clone)]
pub struct MoviesState {
    pub db: Database,
}

pub fn router(state: MoviesState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/data/{imdb_id}", get(get_movie))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SearchQuery {
    title: Option<String>,
    year: Option<String>,
    page: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    title: String,
    year: Option<i64>,
    #[serde(rename = "imdbID")]
    imdb_id: String,
    imdb_rating: Option<f64>,
    rotten_tomatoes_rating: Option<f64>,
    metacritic_rating: Option<f64>,
    classification: String,
}

impl From<MovieSummary> for SearchItem {
    fn from(m: MovieSummary) -> Self {
        Self {
            title: m.title.unwrap_or_else(|| "Unknown Title".to_string()),
            year: m.year,
            imdb_id: m.imdb_id,
            imdb_rating: m.imdb_rating,
            rotten_tomatoes_rating: m.rotten_tomatoes_rating,
            metacritic_rating: m.metacritic_rating,
            classification: m.classification.unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub last_page: i64,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
    pub per_page: i64,
    pub current_page: i64,
    pub from: i64,
    pub to: i64,
}

impl Pagination {
    /// `returned` is the number of rows on the current page.
    pub fn new(total: i64, current_page: i64, returned: i64) -> Self {
        let last_page = (total + PER_PAGE - 1) / PER_PAGE;
        let from = current_page.saturating_sub(1).saturating_mul(PER_PAGE);
        Self {
            total,
            last_page,
            prev_page: (current_page > 1).then(|| current_page - 1),
            next_page: (current_page < last_page).then(|| current_page.saturating_add(1)),
            per_page: PER_PAGE,
            current_page,
            from,
            to: from.saturating_add(returned),
        }
    }
}

#[derive(Serialize)]
struct SearchResponse {
    data: Vec<SearchItem>,
    pagination: Pagination,
}

#[derive(Serialize)]
struct PrincipalResponse {
    id: String,
    category: Option<String>,
    name: Option<String>,
    characters: Vec<String>,
}

impl From<Principal> for PrincipalResponse {
    fn from(p: Principal) -> Self {
        Self {
            characters: parse_string_list(p.characters.as_deref()),
            id: p.id,
            category: p.category,
            name: p.name,
        }
    }
}

#[derive(Serialize)]
struct RatingResponse {
    source: String,
    value: Value,
}

impl From<Rating> for RatingResponse {
    fn from(r: Rating) -> Self {
        Self {
            value: parse_rating_value(&r.value),
            source: r.source,
        }
    }
}

#[derive(Serialize)]
struct MovieResponse {
    title: Option<String>,
    year: Option<i64>,
    runtime: Option<i64>,
    genres: Vec<String>,
    country: Option<String>,
    poster: Option<String>,
    plot: Option<String>,
    boxoffice: Option<String>,
    principals: Vec<PrincipalResponse>,
    ratings: Vec<RatingResponse>,
}

// --- Handlers ---

async fn search(
    State(state): State<MoviesState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let current_page = parse_page(query.page.as_deref())?;
    let year = parse_year(query.year.as_deref())?;

    let filter = MovieFilter {
        title: query.title.filter(|t| !t.is_empty()),
        year,
    };

    let movies = state.db.movies();
    let total = movies.count(&filter).await.db_err("Failed to count movies")?;

    let offset = current_page.saturating_sub(1).saturating_mul(PER_PAGE);
    let rows = if offset < total {
        movies
            .search(&filter, PER_PAGE, offset)
            .await
            .db_err("Failed to search movies")?
    } else {
        Vec::new()
    };

    let pagination = Pagination::new(total, current_page, rows.len() as i64);

    Ok(Json(SearchResponse {
        data: rows.into_iter().map(SearchItem::from).collect(),
        pagination,
    }))
}

async fn get_movie(
    State(state): State<MoviesState>,
    Path(imdb_id): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    reject_query(raw_query.as_deref())?;

    let movies = state.db.movies();
    let movie = movies
        .get(&imdb_id)
        .await
        .db_err("Failed to get movie")?
        .ok_or_else(|| ApiError::not_found("No record exists of a movie with this ID"))?;

    let principals = movies
        .principals(&imdb_id)
        .await
        .db_err("Failed to get principals")?;
    let ratings = movies
        .ratings(&imdb_id)
        .await
        .db_err("Failed to get ratings")?;

    Ok(Json(MovieResponse {
        title: movie.title,
        year: movie.year,
        runtime: movie.runtime,
        genres: movie
            .genres
            .filter(|g| !g.is_empty())
            .map(|g| g.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        country: movie.country,
        poster: movie.poster,
        plot: movie.plot,
        boxoffice: movie.boxoffice,
        principals: principals.into_iter().map(PrincipalResponse::from).collect(),
        ratings: ratings.into_iter().map(RatingResponse::from).collect(),
    }))
}

// --- Parsing ---

/// Absent, empty or sub-1 pages mean page 1. Fractional pages are truncated.
/// Highest page whose row offset still fits in an `i64`.
const MAX_PAGE: i64 = i64::MAX / PER_PAGE;

fn parse_page(page: Option<&str>) -> Result<i64, ApiError> {
    let Some(page) = page.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(1);
    };
    let value: f64 = page
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ApiError::bad_request("Invalid page format. page must be a number."))?;
    Ok((value.trunc() as i64).clamp(1, MAX_PAGE))
}

fn parse_year(year: Option<&str>) -> Result<Option<i64>, ApiError> {
    match year.filter(|y| !y.is_empty()) {
        None => Ok(None),
        Some(y) if y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()) => y
            .parse()
            .map(Some)
            .map_err(|_| ApiError::bad_request("Invalid year format. Format must be yyyy.")),
        Some(_) => Err(ApiError::bad_request(
            "Invalid year format. Format must be yyyy.",
        )),
    }
}

/// Leading numeric part of a string such as `7.5/10`.
pub(super) fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].parse().ok()
}

/// Normalise a rating string: `7.5/10` becomes 7.5, `85%` becomes 85 and
/// `70/100` becomes 70. Unrecognised formats are kept as strings.
pub fn parse_rating_value(raw: &str) -> Value {
    let numeric = if raw.contains("/100") || raw.contains('%') {
        leading_number(raw).map(|n| Value::from(n.trunc() as i64))
    } else if raw.contains("/10") {
        leading_number(raw).and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
    } else {
        None
    };
    numeric.unwrap_or_else(|| Value::String(raw.to_string()))
}
