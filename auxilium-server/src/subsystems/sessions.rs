//! Emergency session table queries, plus the operator list and the AI audit
//! trail. Each write is one short statement; the relational engine carries
//! the consistency guarantees.

use auxilium_core::models::{EmergencySession, Operator, SessionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

/// Listing shape for GET /emergency-sessions.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub id: i64,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewSession {
    pub user_id: i64,
    pub photo_url: String,
    pub audio_url: String,
    pub transcript: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn insert_session(
    pool: &PgPool,
    new: &NewSession,
) -> Result<EmergencySession, sqlx::Error> {
    sqlx::query_as::<_, EmergencySession>(
        r#"
        INSERT INTO emergency_sessions
            (user_id, photo_url, audio_url, transcript, location_lat, location_lng, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'en_attente')
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(&new.photo_url)
    .bind(&new.audio_url)
    .bind(&new.transcript)
    .bind(new.latitude)
    .bind(new.longitude)
    .fetch_one(pool)
    .await
}

pub async fn get_session(
    pool: &PgPool,
    id: i64,
) -> Result<Option<EmergencySession>, sqlx::Error> {
    sqlx::query_as::<_, EmergencySession>("SELECT * FROM emergency_sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_sessions(pool: &PgPool) -> Result<Vec<SessionSummary>, sqlx::Error> {
    sqlx::query_as::<_, SessionSummary>(
        "SELECT id, status, created_at FROM emergency_sessions ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

/// Persist a verdict. Overwrites any previous analysis outcome on the row
/// (destructive refresh); concurrent callers are last-writer-wins.
pub async fn record_verdict(
    pool: &PgPool,
    id: i64,
    status: SessionStatus,
    ia_result: Option<&str>,
    ia_reason: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE emergency_sessions
        SET status = $2, ia_result = $3, ia_reason = $4, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(ia_result)
    .bind(ia_reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a failed classifier invocation: reason only, status untouched.
pub async fn record_analysis_failure(
    pool: &PgPool,
    id: i64,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE emergency_sessions SET ia_reason = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Append one row to the AI audit trail.
pub async fn insert_ai_log(
    pool: &PgPool,
    session_id: i64,
    ai_version: &str,
    input_summary: &str,
    output_summary: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ai_logs (session_id, ai_version, input_summary, output_summary)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(session_id)
    .bind(ai_version)
    .bind(input_summary)
    .bind(output_summary)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_operators(pool: &PgPool) -> Result<Vec<Operator>, sqlx::Error> {
    sqlx::query_as::<_, Operator>("SELECT * FROM operators ORDER BY id")
        .fetch_all(pool)
        .await
}
