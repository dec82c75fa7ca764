use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only GPS sample tied to a session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub session_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
