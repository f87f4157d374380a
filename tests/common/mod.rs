#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use cinedex::{ServerConfig, create_app, db::Database, jwt::JwtConfig, password::hash_password};
use serde_json::Value;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough-for-hs256";
pub const TEST_BCRYPT_COST: u32 = 4;

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: TEST_SECRET.to_vec(),
        bcrypt_cost: TEST_BCRYPT_COST,
    }
}

/// Create a test app and return (app, db, jwt_config).
pub async fn create_test_app() -> (Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone()));
    (app, db, JwtConfig::new(TEST_SECRET))
}

/// Insert a user with a bcrypt hash of `password`.
pub async fn seed_user(db: &Database, email: &str, password: &str) {
    let hash = hash_password(password, TEST_BCRYPT_COST).await.unwrap();
    db.users().create(email, &hash).await.unwrap();
}

pub async fn seed_movie(db: &Database, id: &str, title: &str, year: i64) {
    sqlx::query(
        "INSERT INTO basics (tconst, primary_title, year, runtime_minutes, genres, country,
                             poster, plot, boxoffice, imdb_rating, rotten_tomatoes_rating,
                             metacritic_rating, rated)
         VALUES (?, ?, ?, 136, 'Action,Sci-Fi', 'United States', 'https://img/poster.jpg',
                 'A hacker learns the truth.', '$171,479,930', 8.7, 88, 73, 'R')",
    )
    .bind(id)
    .bind(title)
    .bind(year)
    .execute(db.pool())
    .await
    .unwrap();
}

pub async fn seed_rating(db: &Database, movie_id: &str, source: &str, value: &str) {
    sqlx::query("INSERT INTO ratings (tconst, source, value) VALUES (?, ?, ?)")
        .bind(movie_id)
        .bind(source)
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
}

pub async fn seed_person(db: &Database, id: &str, name: &str, birth_year: i64) {
    sqlx::query("INSERT INTO names (nconst, primary_name, birth_year, death_year) VALUES (?, ?, ?, NULL)")
        .bind(id)
        .bind(name)
        .bind(birth_year)
        .execute(db.pool())
        .await
        .unwrap();
}

pub async fn seed_principal(
    db: &Database,
    movie_id: &str,
    person_id: &str,
    name: &str,
    category: &str,
    characters: &str,
) {
    sqlx::query(
        "INSERT INTO principals (tconst, nconst, category, name, characters) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(movie_id)
    .bind(person_id)
    .bind(category)
    .bind(name)
    .bind(characters)
    .execute(db.pool())
    .await
    .unwrap();
}

pub fn json_request(method: &str, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
