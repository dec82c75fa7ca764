use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit trail of AI invocations per session, one row per call.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiLog {
    pub id: i64,
    pub session_id: Option<i64>,
    pub ai_version: Option<String>,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}
