use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Idempotent DDL executed at startup. The schema is conventional CRUD:
/// referential integrity and uniqueness live in the database, not in
/// application code.
const SCHEMA: &[&str] = &[
    r#"
    DO $$ BEGIN
        CREATE TYPE session_status AS ENUM
            ('en_attente', 'a_affecter', 'en_cours_appel', 'en_suivi', 'cloture');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        device_id TEXT NOT NULL UNIQUE,
        card_recto_url TEXT,
        card_verso_url TEXT,
        verified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS operators (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('operator', 'supervisor')),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS emergency_sessions (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
        operator_id BIGINT REFERENCES operators(id) ON DELETE SET NULL,
        status session_status NOT NULL DEFAULT 'en_attente',
        photo_url TEXT,
        audio_url TEXT,
        transcript TEXT,
        ia_result TEXT,
        ia_reason TEXT,
        location_lat DOUBLE PRECISION,
        location_lng DOUBLE PRECISION,
        address TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        closed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_session_status ON emergency_sessions (status)",
    "CREATE INDEX IF NOT EXISTS idx_session_user ON emergency_sessions (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS session_updates (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT NOT NULL REFERENCES emergency_sessions(id) ON DELETE CASCADE,
        update_type TEXT NOT NULL,
        content_url TEXT,
        text TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_updates_session ON session_updates (session_id)",
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT NOT NULL REFERENCES emergency_sessions(id) ON DELETE CASCADE,
        latitude DOUBLE PRECISION NOT NULL,
        longitude DOUBLE PRECISION NOT NULL,
        accuracy DOUBLE PRECISION,
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_logs (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT REFERENCES emergency_sessions(id) ON DELETE CASCADE,
        ai_version TEXT,
        input_summary TEXT,
        output_summary TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS calls (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT REFERENCES emergency_sessions(id) ON DELETE CASCADE,
        operator_id BIGINT REFERENCES operators(id) ON DELETE SET NULL,
        call_type TEXT CHECK (call_type IN ('visio', 'audio')),
        started_at TIMESTAMPTZ,
        ended_at TIMESTAMPTZ,
        duration INTEGER
    )
    "#,
];

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Database schema ready");
    Ok(())
}

/// True when the error is a Postgres unique-constraint violation (23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
