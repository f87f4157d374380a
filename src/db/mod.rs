mod movies;
mod people;
mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use movies::{Movie, MovieFilter, MovieStore, MovieSummary, Principal, Rating};
pub use people::{IMDB_RATING_SOURCE, Person, PersonStore, Role};
pub use token::RevokedTokenStore;
pub use user::{ProfileUpdate, User, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Email is the identity; BINARY collation keeps it case-sensitive
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE BINARY,
                    hash TEXT NOT NULL,
                    first_name TEXT,
                    last_name TEXT,
                    dob TEXT,
                    address TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE TABLE revoked_tokens (
                    jti TEXT PRIMARY KEY,
                    email TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    revoked_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_revoked_tokens_expires_at ON revoked_tokens(expires_at)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Catalogue tables, populated externally
                "CREATE TABLE IF NOT EXISTS basics (
                    tconst TEXT PRIMARY KEY,
                    primary_title TEXT,
                    year INTEGER,
                    runtime_minutes INTEGER,
                    genres TEXT,
                    country TEXT,
                    poster TEXT,
                    plot TEXT,
                    boxoffice TEXT,
                    imdb_rating REAL,
                    rotten_tomatoes_rating REAL,
                    metacritic_rating REAL,
                    rated TEXT
                )",
                "CREATE INDEX IF NOT EXISTS idx_basics_year ON basics(year)",
                "CREATE TABLE IF NOT EXISTS principals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tconst TEXT NOT NULL,
                    nconst TEXT NOT NULL,
                    category TEXT,
                    name TEXT,
                    characters TEXT
                )",
                "CREATE INDEX IF NOT EXISTS idx_principals_tconst ON principals(tconst)",
                "CREATE INDEX IF NOT EXISTS idx_principals_nconst ON principals(nconst)",
                "CREATE TABLE IF NOT EXISTS ratings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tconst TEXT NOT NULL,
                    source TEXT NOT NULL,
                    value TEXT NOT NULL
                )",
                "CREATE INDEX IF NOT EXISTS idx_ratings_tconst ON ratings(tconst)",
                "CREATE TABLE IF NOT EXISTS names (
                    nconst TEXT PRIMARY KEY,
                    primary_name TEXT,
                    birth_year INTEGER,
                    death_year INTEGER
                )",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the revoked refresh token store.
    pub fn revoked_tokens(&self) -> RevokedTokenStore {
        RevokedTokenStore::new(self.pool.clone())
    }

    /// Get the movie catalogue store.
    pub fn movies(&self) -> MovieStore {
        MovieStore::new(self.pool.clone())
    }

    /// Get the people store.
    pub fn people(&self) -> PersonStore {
        PersonStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
