//! User table queries. The unique constraint on device_id lives in the
//! database; callers map violations to HTTP 409 via
//! `auxilium_core::db::is_unique_violation`.

use auxilium_core::models::User;
use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub device_id: String,
    pub card_recto_url: Option<String>,
    pub card_verso_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

pub async fn create_user(pool: &PgPool, req: &CreateUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (device_id, card_recto_url, card_verso_url, verified)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&req.device_id)
    .bind(&req.card_recto_url)
    .bind(&req.card_verso_url)
    .bind(req.verified)
    .fetch_one(pool)
    .await
}

pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_device(
    pool: &PgPool,
    device_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE device_id = $1")
        .bind(device_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_user(
    pool: &PgPool,
    id: i64,
    req: &CreateUser,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET device_id = $2, card_recto_url = $3, card_verso_url = $4, verified = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&req.device_id)
    .bind(&req.card_recto_url)
    .bind(&req.card_verso_url)
    .bind(req.verified)
    .fetch_optional(pool)
    .await
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await
}
