//! Classification of a session and application of the verdict.
//!
//! `triage` is the pure verdict-to-status mapping; `analyze_session` runs
//! the classifier against a stored session and persists the outcome. Both
//! the intake pipeline and the re-analysis endpoint go through here, so the
//! branch behavior is pinned down in one place.

use auxilium_core::classifier::{ClassifierError, EmergencyClassifier, Verdict};
use auxilium_core::models::{EmergencySession, SessionStatus};
use sqlx::PgPool;

use super::sessions;

/// Reason recorded when the model finds no danger but gives no justification.
const DEFAULT_NON_URGENT_REASON: &str = "Analyse IA: Non urgent";

/// Outcome of mapping a verdict onto session state.
#[derive(Debug, Clone, PartialEq)]
pub struct Triage {
    pub status: SessionStatus,
    pub ia_result: String,
    pub ia_reason: Option<String>,
}

/// Pure branch on the model's verdict: danger flags the session for
/// assignment, anything else closes it with the model's justification.
pub fn triage(verdict: &Verdict) -> Triage {
    let ia_result = serde_json::to_string(verdict)
        .unwrap_or_else(|_| format!("urgence_pompiers={}", verdict.urgence_pompiers));

    if verdict.urgence_pompiers {
        Triage {
            status: SessionStatus::AAffecter,
            ia_result,
            ia_reason: None,
        }
    } else {
        let reason = verdict
            .justification
            .clone()
            .unwrap_or_else(|| DEFAULT_NON_URGENT_REASON.to_string());
        Triage {
            status: SessionStatus::Cloture,
            ia_result,
            ia_reason: Some(reason),
        }
    }
}

/// Run the classifier against a stored session and persist the result.
///
/// Destructive refresh: any previous verdict on the row is overwritten. On a
/// classifier failure the reason lands in `ia_reason` and the status stays
/// whatever it was; no verdict is synthesized. Every invocation, failed or
/// not, appends an `ai_logs` row. Only database errors propagate.
///
/// Returns the resulting status and the raw call outcome in the envelope
/// shape the mobile app already parses.
pub async fn analyze_session(
    pool: &PgPool,
    classifier: &dyn EmergencyClassifier,
    session: &EmergencySession,
) -> Result<(SessionStatus, serde_json::Value), sqlx::Error> {
    let photo_url = session.photo_url.as_deref().unwrap_or_default();
    let transcript = session.transcript.as_deref().unwrap_or_default();
    let input_summary = format!("photo={} transcript_chars={}", photo_url, transcript.len());

    match classifier.analyze(photo_url, transcript, Some(session.id)).await {
        Ok(verdict) => {
            let outcome = triage(&verdict);

            if outcome.status == SessionStatus::AAffecter {
                tracing::warn!(
                    session_id = session.id,
                    description = verdict.description.as_deref().unwrap_or("Urgence non specifiee"),
                    "URGENCE DETECTEE"
                );
            } else {
                tracing::info!(
                    session_id = session.id,
                    reason = outcome.ia_reason.as_deref().unwrap_or_default(),
                    "Session non urgente, cloturee"
                );
            }

            sessions::record_verdict(
                pool,
                session.id,
                outcome.status,
                Some(&outcome.ia_result),
                outcome.ia_reason.as_deref(),
            )
            .await?;

            sessions::insert_ai_log(
                pool,
                session.id,
                classifier.name(),
                &input_summary,
                &outcome.ia_result,
            )
            .await?;

            Ok((
                outcome.status,
                serde_json::json!({
                    "success": true,
                    "result": serde_json::to_value(&verdict).unwrap_or_default(),
                }),
            ))
        }
        Err(e) => {
            let reason = classifier_failure_reason(&e);
            tracing::error!(session_id = session.id, error = %e, "Classifier call failed");

            sessions::record_analysis_failure(pool, session.id, &reason).await?;
            sessions::insert_ai_log(pool, session.id, classifier.name(), &input_summary, &reason)
                .await?;

            Ok((
                session.status,
                serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                }),
            ))
        }
    }
}

fn classifier_failure_reason(e: &ClassifierError) -> String {
    format!("Erreur IA: {}", e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(urgence: bool, justification: Option<&str>) -> Verdict {
        Verdict {
            urgence_pompiers: urgence,
            niveau_danger: None,
            description: None,
            justification: justification.map(String::from),
        }
    }

    #[test]
    fn danger_routes_to_assignment() {
        let outcome = triage(&verdict(true, Some("flammes visibles")));
        assert_eq!(outcome.status, SessionStatus::AAffecter);
        assert!(outcome.ia_reason.is_none(), "danger verdicts carry no rejection reason");
        assert!(outcome.ia_result.contains("\"urgence_pompiers\":true"));
    }

    #[test]
    fn no_danger_closes_with_justification() {
        let outcome = triage(&verdict(false, Some("Aucune fumee visible")));
        assert_eq!(outcome.status, SessionStatus::Cloture);
        assert_eq!(outcome.ia_reason.as_deref(), Some("Aucune fumee visible"));
    }

    #[test]
    fn missing_justification_falls_back_to_default_reason() {
        let outcome = triage(&verdict(false, None));
        assert_eq!(outcome.status, SessionStatus::Cloture);
        assert_eq!(outcome.ia_reason.as_deref(), Some(DEFAULT_NON_URGENT_REASON));
    }

    #[test]
    fn failure_reason_keeps_original_wire_format() {
        let reason = classifier_failure_reason(&ClassifierError::Rejected("image inaccessible".into()));
        assert_eq!(reason, "Erreur IA: Classifier rejected the request: image inaccessible");
    }
}
