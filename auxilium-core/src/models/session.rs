use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Triage state of an emergency session.
///
/// The backend only automates the first branch: `EnAttente` moves to
/// `AAffecter` when the AI flags danger, or to `Cloture` when it does not.
/// The remaining transitions are driven by operator action elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    EnAttente,
    AAffecter,
    EnCoursAppel,
    EnSuivi,
    Cloture,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 5] = [
        SessionStatus::EnAttente,
        SessionStatus::AAffecter,
        SessionStatus::EnCoursAppel,
        SessionStatus::EnSuivi,
        SessionStatus::Cloture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::EnAttente => "en_attente",
            SessionStatus::AAffecter => "a_affecter",
            SessionStatus::EnCoursAppel => "en_cours_appel",
            SessionStatus::EnSuivi => "en_suivi",
            SessionStatus::Cloture => "cloture",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The central record: one citizen emergency report and its derived triage
/// state. Media URLs, transcript and AI verdict are filled in by the intake
/// pipeline; operator assignment happens later.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmergencySession {
    pub id: i64,
    pub user_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub status: SessionStatus,
    pub photo_url: Option<String>,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub ia_result: Option<String>,
    pub ia_reason: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_serde() {
        let json = serde_json::to_string(&SessionStatus::AAffecter).unwrap();
        assert_eq!(json, "\"a_affecter\"");
        let back: SessionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionStatus::AAffecter);
    }

    #[test]
    fn status_as_str_matches_enum_labels() {
        for status in SessionStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
