use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Date of birth as `YYYY-MM-DD`
    pub dob: Option<String>,
    pub address: Option<String>,
}

/// Validated owner-supplied profile fields.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub address: String,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    pub async fn create(&self, email: &str, hash: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (email, hash) VALUES (?, ?)")
            .bind(email)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email (exact, case-sensitive match).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, hash, first_name, last_name, dob, address FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Check whether an email is already registered.
    pub async fn exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Overwrite the profile fields of a user. Returns false if no such user.
    pub async fn update_profile(
        &self,
        email: &str,
        update: &ProfileUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, dob = ?, address = ? WHERE email = ?",
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.dob)
        .bind(&update.address)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
