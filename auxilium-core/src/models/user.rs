use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A citizen, identified by the device that installed the mobile app.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub device_id: String,
    pub card_recto_url: Option<String>,
    pub card_verso_url: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}
