use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human staff member. Role is constrained to 'operator' or 'supervisor'
/// by a check constraint on the table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Operator {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
