use sqlx::sqlite::SqlitePool;

/// Rating source whose value is reported alongside a person's roles.
pub const IMDB_RATING_SOURCE: &str = "Internet Movie Database";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Person {
    pub name: Option<String>,
    pub birth_year: Option<i64>,
    pub death_year: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Role {
    pub movie_name: Option<String>,
    pub movie_id: String,
    pub category: Option<String>,
    /// JSON array of character names
    pub characters: Option<String>,
    /// Raw IMDb rating value such as `7.5/10`
    pub imdb_rating: Option<String>,
}

pub struct PersonStore {
    pool: SqlitePool,
}

impl PersonStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a person by IMDb name ID.
    pub async fn get(&self, id: &str) -> Result<Option<Person>, sqlx::Error> {
        sqlx::query_as("SELECT primary_name AS name, birth_year, death_year FROM names WHERE nconst = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List every role a person played, with the movie's IMDb rating if known.
    pub async fn roles(&self, id: &str) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as(
            "SELECT b.primary_title AS movie_name, b.tconst AS movie_id, p.category,
                    p.characters, r.value AS imdb_rating
             FROM principals p
             JOIN basics b ON p.tconst = b.tconst
             LEFT JOIN ratings r ON b.tconst = r.tconst AND r.source = ?
             WHERE p.nconst = ?
             ORDER BY b.tconst",
        )
        .bind(IMDB_RATING_SOURCE)
        .bind(id)
        .fetch_all(&self.pool)
        .await
    }
}
