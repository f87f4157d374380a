//! Read-only access to the movie catalogue (`basics`, `principals`, `ratings`).

use sqlx::sqlite::SqlitePool;

/// Search result row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieSummary {
    pub title: Option<String>,
    pub year: Option<i64>,
    pub imdb_id: String,
    pub imdb_rating: Option<f64>,
    pub rotten_tomatoes_rating: Option<f64>,
    pub metacritic_rating: Option<f64>,
    pub classification: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Movie {
    pub title: Option<String>,
    pub year: Option<i64>,
    pub runtime: Option<i64>,
    /// Comma-separated genre list
    pub genres: Option<String>,
    pub country: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub boxoffice: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Principal {
    pub id: String,
    pub category: Option<String>,
    pub name: Option<String>,
    /// JSON array of character names
    pub characters: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Rating {
    pub source: String,
    pub value: String,
}

/// Search filters. Both are optional; absent filters match everything.
#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    /// Substring of the primary title
    pub title: Option<String>,
    pub year: Option<i64>,
}

pub struct MovieStore {
    pool: SqlitePool,
}

const FILTER_CLAUSE: &str = "(? IS NULL OR primary_title LIKE '%' || ? || '%') AND (? IS NULL OR year = ?)";

impl MovieStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count the movies matching a filter.
    pub async fn count(&self, filter: &MovieFilter) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM basics WHERE {}", FILTER_CLAUSE);
        let count: (i64,) = sqlx::query_as(&sql)
            .bind(&filter.title)
            .bind(&filter.title)
            .bind(filter.year)
            .bind(filter.year)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Fetch one page of matching movies ordered by IMDb ID.
    pub async fn search(
        &self,
        filter: &MovieFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MovieSummary>, sqlx::Error> {
        let sql = format!(
            "SELECT primary_title AS title, year, tconst AS imdb_id, imdb_rating,
                    rotten_tomatoes_rating, metacritic_rating, rated AS classification
             FROM basics WHERE {}
             ORDER BY tconst ASC LIMIT ? OFFSET ?",
            FILTER_CLAUSE
        );
        sqlx::query_as(&sql)
            .bind(&filter.title)
            .bind(&filter.title)
            .bind(filter.year)
            .bind(filter.year)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    /// Get a movie by IMDb ID.
    pub async fn get(&self, imdb_id: &str) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as(
            "SELECT primary_title AS title, year, runtime_minutes AS runtime, genres, country,
                    poster, plot, boxoffice
             FROM basics WHERE tconst = ?",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the principal cast and crew of a movie.
    pub async fn principals(&self, imdb_id: &str) -> Result<Vec<Principal>, sqlx::Error> {
        sqlx::query_as(
            "SELECT nconst AS id, category, name, characters FROM principals
             WHERE tconst = ? ORDER BY principals.id",
        )
        .bind(imdb_id)
        .fetch_all(&self.pool)
        .await
    }

    /// List the ratings of a movie from every source.
    pub async fn ratings(&self, imdb_id: &str) -> Result<Vec<Rating>, sqlx::Error> {
        sqlx::query_as("SELECT source, value FROM ratings WHERE tconst = ? ORDER BY id")
            .bind(imdb_id)
            .fetch_all(&self.pool)
            .await
    }
}
