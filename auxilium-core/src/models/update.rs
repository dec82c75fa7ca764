use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only timeline entry tied to a session.
/// `update_type` is a free-text tag: photo, audio, position, message,
/// call_started, call_ended.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionUpdate {
    pub id: i64,
    pub session_id: i64,
    pub update_type: String,
    pub content_url: Option<String>,
    pub text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}
