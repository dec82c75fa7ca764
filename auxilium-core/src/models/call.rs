use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Voice/video call tied to a session and an operator.
/// `call_type` is constrained to 'visio' or 'audio' by the table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Call {
    pub id: i64,
    pub session_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub call_type: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
}
