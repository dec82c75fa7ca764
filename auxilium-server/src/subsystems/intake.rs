//! Emergency intake pipeline.
//!
//! upload → transcribe → persist → classify → update status. The contract
//! is that a degraded optional step (storage, transcription, classifier)
//! never fails the citizen-facing submission; only a database failure, or a
//! storage path with no working fallback left, aborts the request.
//!
//! Collaborators are injected through the core traits so tests can exercise
//! the ordering and fallback behavior with fakes.

use auxilium_core::classifier::EmergencyClassifier;
use auxilium_core::models::SessionStatus;
use auxilium_core::storage::{MediaStorage, StorageError};
use auxilium_core::transcription::{Transcriber, TRANSCRIPT_UNAVAILABLE};
use sqlx::PgPool;
use thiserror::Error;

use super::{analysis, sessions};

#[derive(Debug)]
pub struct IntakeRequest {
    pub user_id: i64,
    pub photo: Vec<u8>,
    pub audio: Vec<u8>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug)]
pub struct IntakeOutcome {
    pub session_id: i64,
    pub status: SessionStatus,
    /// Raw classifier call outcome, echoed back to the app.
    pub ai_result: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum IntakeError {
    /// Storage failed with no fallback left (the wired strategy only errors
    /// when the local write itself fails).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Deterministic per-report names: a re-submit of the same report
/// overwrites rather than accumulates.
pub fn media_filenames(user_id: i64, latitude: f64, longitude: f64) -> (String, String) {
    (
        format!("photo_{}_{}_{}.jpg", user_id, latitude, longitude),
        format!("audio_{}_{}_{}.m4a", user_id, latitude, longitude),
    )
}

pub async fn run_intake(
    pool: &PgPool,
    storage: &dyn MediaStorage,
    transcriber: &dyn Transcriber,
    classifier: &dyn EmergencyClassifier,
    req: IntakeRequest,
) -> Result<IntakeOutcome, IntakeError> {
    let (photo_name, audio_name) = media_filenames(req.user_id, req.latitude, req.longitude);

    // 1. Store media. The fallback strategy inside `storage` degrades to
    //    local disk + placeholder photo URL without surfacing an error.
    let photo_url = storage.upload(&req.photo, &photo_name, "image/jpeg").await?;
    let audio_url = storage.upload(&req.audio, &audio_name, "audio/m4a").await?;
    tracing::info!(photo_url = %photo_url, audio_url = %audio_url, "Media stored");

    // 2. Transcribe; substitution, never abort.
    let transcript = match transcriber.transcribe(&req.audio, &audio_name).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Transcription failed, storing sentinel");
            TRANSCRIPT_UNAVAILABLE.to_string()
        }
    };

    // 3. Persist the session as pending before any AI involvement.
    let session = sessions::insert_session(
        pool,
        &sessions::NewSession {
            user_id: req.user_id,
            photo_url,
            audio_url,
            transcript,
            latitude: req.latitude,
            longitude: req.longitude,
        },
    )
    .await?;

    tracing::info!(session_id = session.id, "Emergency session created, running analysis");

    // 4–6. Classify and persist the verdict (or the failure reason).
    let (status, ai_result) = analysis::analyze_session(pool, classifier, &session).await?;

    Ok(IntakeOutcome {
        session_id: session.id,
        status,
        ai_result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_derive_from_user_and_coordinates() {
        let (photo, audio) = media_filenames(12, 48.8566, 2.3522);
        assert_eq!(photo, "photo_12_48.8566_2.3522.jpg");
        assert_eq!(audio, "audio_12_48.8566_2.3522.m4a");
    }

    #[test]
    fn filenames_are_deterministic() {
        assert_eq!(media_filenames(1, 0.0, 0.0), media_filenames(1, 0.0, 0.0));
    }
}
