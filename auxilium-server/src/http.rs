//! Auxilium HTTP REST API
//!
//! Axum-based HTTP server for the emergency-reporting mobile app.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - GET  /                                   — liveness message
//! - GET  /health                             — DB connectivity probe
//! - GET  /models/info                        — entity names + status values
//! - GET/POST /users, GET/PUT /users/{id}, GET /users/device/{device_id}
//! - GET  /operators                          — list operators
//! - GET  /emergency-sessions                 — list sessions
//! - POST /emergency-sessions                 — multipart intake pipeline
//! - GET  /emergency-sessions/{id}/ai-result  — stored verdict
//! - POST /emergency-sessions/{id}/analyze    — destructive re-analysis
//! - GET  /ai/status                          — classifier liveness
//! - /uploads/*                               — local-fallback media, static

use std::sync::Arc;

use anyhow::Result;
use auxilium_core::classifier::{ColabClassifier, EmergencyClassifier};
use auxilium_core::storage::{FallbackStorage, MediaStorage};
use auxilium_core::transcription::{Transcriber, WhisperTranscriber};
use auxilium_core::{db, AuxiliumConfig};
use auxilium_core::models::SessionStatus;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::subsystems::intake::{run_intake, IntakeError, IntakeRequest};
use crate::subsystems::{analysis, sessions, users};

/// Shared state for all HTTP handlers. Collaborators are trait objects so
/// tests can wire in fakes.
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub config: AuxiliumConfig,
    pub storage: Arc<dyn MediaStorage>,
    pub transcriber: Arc<dyn Transcriber>,
    pub classifier: Arc<dyn EmergencyClassifier>,
}

impl HttpState {
    /// Wire the real collaborators from configuration.
    pub fn from_config(pool: PgPool, config: AuxiliumConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.local_dir)?;

        let storage = FallbackStorage::from_config(&config.storage, &config.service.public_base_url)?;
        let transcriber = WhisperTranscriber::new(&config.transcription)?;
        let classifier = ColabClassifier::new(&config.classifier)?;

        Ok(Self {
            pool,
            config,
            storage: Arc::new(storage),
            transcriber: Arc::new(transcriber),
            classifier: Arc::new(classifier),
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let uploads_dir = state.config.storage.local_dir.clone();
    let cors = cors_layer(&state.config.http.cors_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/models/info", get(models_info_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/users/:id", get(get_user_handler).put(update_user_handler))
        .route("/users/device/:device_id", get(get_user_by_device_handler))
        .route("/operators", get(list_operators_handler))
        .route(
            "/emergency-sessions",
            get(list_sessions_handler).post(create_session_handler),
        )
        .route("/emergency-sessions/:id/ai-result", get(ai_result_handler))
        .route("/emergency-sessions/:id/analyze", post(analyze_handler))
        .route("/ai/status", get(ai_status_handler))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        // Photo plus audio in one multipart body can exceed the 2 MB default.
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Auxilium HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

const ROOT_MESSAGE: &str = "API Auxilium est en marche !";
const USER_NOT_FOUND: &str = "Utilisateur non trouvé";
const SESSION_NOT_FOUND: &str = "Session non trouvée";
const DUPLICATE_DEVICE: &str = "Un utilisateur avec ce device_id existe déjà";

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": msg.into(), "status": "error" })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "message": ROOT_MESSAGE })
}

/// Inner health check — a DB outage is a 503 body, never an unhandled error.
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match db::health_check(pool).await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "database": "connected",
                "postgresql": version,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner models info — static entity and status listing (pure, no IO).
pub fn models_info_inner() -> serde_json::Value {
    serde_json::json!({
        "models": [
            "User", "Operator", "EmergencySession",
            "SessionUpdate", "Location", "AILog", "Call"
        ],
        "session_statuses": SessionStatus::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>(),
        "description": "Modèles de données pour l'application d'urgence",
    })
}

pub async fn list_users_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match users::list_users(pool).await {
        Ok(list) => (StatusCode::OK, serde_json::json!({ "users": list })),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn create_user_inner(
    pool: &PgPool,
    req: users::CreateUser,
) -> (StatusCode, serde_json::Value) {
    match users::create_user(pool, &req).await {
        Ok(user) => (StatusCode::CREATED, serde_json::to_value(user).unwrap_or_default()),
        Err(e) if db::is_unique_violation(&e) => {
            (StatusCode::CONFLICT, error_body(DUPLICATE_DEVICE))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn get_user_inner(pool: &PgPool, id: i64) -> (StatusCode, serde_json::Value) {
    match users::get_user(pool, id).await {
        Ok(Some(user)) => (StatusCode::OK, serde_json::to_value(user).unwrap_or_default()),
        Ok(None) => (StatusCode::NOT_FOUND, error_body(USER_NOT_FOUND)),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn get_user_by_device_inner(
    pool: &PgPool,
    device_id: &str,
) -> (StatusCode, serde_json::Value) {
    match users::get_user_by_device(pool, device_id).await {
        Ok(Some(user)) => (StatusCode::OK, serde_json::to_value(user).unwrap_or_default()),
        Ok(None) => (StatusCode::NOT_FOUND, error_body(USER_NOT_FOUND)),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn update_user_inner(
    pool: &PgPool,
    id: i64,
    req: users::CreateUser,
) -> (StatusCode, serde_json::Value) {
    match users::update_user(pool, id, &req).await {
        Ok(Some(user)) => (StatusCode::OK, serde_json::to_value(user).unwrap_or_default()),
        Ok(None) => (StatusCode::NOT_FOUND, error_body(USER_NOT_FOUND)),
        Err(e) if db::is_unique_violation(&e) => {
            (StatusCode::CONFLICT, error_body(DUPLICATE_DEVICE))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn list_operators_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match sessions::list_operators(pool).await {
        Ok(list) => (StatusCode::OK, serde_json::json!({ "operators": list })),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn list_sessions_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match sessions::list_sessions(pool).await {
        Ok(list) => (StatusCode::OK, serde_json::json!({ "sessions": list })),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

/// Inner intake — runs the full pipeline against the injected collaborators.
pub async fn intake_inner(
    state: &HttpState,
    req: IntakeRequest,
) -> (StatusCode, serde_json::Value) {
    match run_intake(
        &state.pool,
        state.storage.as_ref(),
        state.transcriber.as_ref(),
        state.classifier.as_ref(),
        req,
    )
    .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            serde_json::json!({
                "session_id": outcome.session_id,
                "status": outcome.status.as_str(),
                "ai_result": outcome.ai_result,
                "message": "Session d'urgence créée et analysée",
            }),
        ),
        Err(IntakeError::Database(e)) => {
            tracing::error!(error = %e, "Intake aborted on database error");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
        Err(IntakeError::Storage(e)) => {
            tracing::error!(error = %e, "Intake aborted, no storage fallback left");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

pub async fn ai_result_inner(pool: &PgPool, id: i64) -> (StatusCode, serde_json::Value) {
    match sessions::get_session(pool, id).await {
        Ok(Some(session)) => (
            StatusCode::OK,
            serde_json::json!({
                "session_id": session.id,
                "ai_result": session.ia_result,
                "ai_reason": session.ia_reason,
                "status": session.status.as_str(),
            }),
        ),
        Ok(None) => (StatusCode::NOT_FOUND, error_body(SESSION_NOT_FOUND)),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

/// Inner re-analysis — destructive refresh of the stored verdict. Callers
/// are warned in the response message; no second row is ever created.
pub async fn analyze_inner(
    pool: &PgPool,
    classifier: &dyn EmergencyClassifier,
    id: i64,
) -> (StatusCode, serde_json::Value) {
    let session = match sessions::get_session(pool, id).await {
        Ok(Some(s)) => s,
        Ok(None) => return (StatusCode::NOT_FOUND, error_body(SESSION_NOT_FOUND)),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    };

    match analysis::analyze_session(pool, classifier, &session).await {
        Ok((status, ai_result)) => (
            StatusCode::OK,
            serde_json::json!({
                "session_id": session.id,
                "ai_result": ai_result,
                "status": status.as_str(),
                "message": "Réanalyse effectuée (le résultat précédent est écrasé)",
            }),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn ai_status_inner(classifier: &dyn EmergencyClassifier) -> serde_json::Value {
    let available = classifier.ping().await;
    serde_json::json!({
        "ai_available": available,
        "message": if available { "Serveur IA connecté" } else { "Serveur IA non disponible" },
    })
}

// ============================================================================
// Multipart parsing for the intake endpoint
// ============================================================================

/// Pull the intake form out of a multipart body. Missing or malformed
/// fields are a client error (422), reported before any collaborator runs.
pub async fn parse_intake_multipart(mut multipart: Multipart) -> Result<IntakeRequest, String> {
    let mut user_id: Option<i64> = None;
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;
    let mut photo: Option<Vec<u8>> = None;
    let mut audio: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("invalid multipart body: {}", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                user_id = Some(text.trim().parse().map_err(|_| "user_id must be an integer")?);
            }
            "latitude" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                latitude = Some(text.trim().parse().map_err(|_| "latitude must be a number")?);
            }
            "longitude" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                longitude = Some(text.trim().parse().map_err(|_| "longitude must be a number")?);
            }
            "photo" => photo = Some(field.bytes().await.map_err(|e| e.to_string())?.to_vec()),
            "audio" => audio = Some(field.bytes().await.map_err(|e| e.to_string())?.to_vec()),
            _ => {}
        }
    }

    Ok(IntakeRequest {
        user_id: user_id.ok_or("missing field: user_id")?,
        photo: photo.ok_or("missing field: photo")?,
        audio: audio.ok_or("missing field: audio")?,
        latitude: latitude.ok_or("missing field: latitude")?,
        longitude: longitude.ok_or("missing field: longitude")?,
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn models_info_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(models_info_inner()))
}

pub async fn list_users_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_users_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn create_user_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<users::CreateUser>,
) -> impl IntoResponse {
    let (status, body) = create_user_inner(&state.pool, req).await;
    (status, Json(body))
}

pub async fn get_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = get_user_inner(&state.pool, id).await;
    (status, Json(body))
}

pub async fn get_user_by_device_handler(
    State(state): State<Arc<HttpState>>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_user_by_device_inner(&state.pool, &device_id).await;
    (status, Json(body))
}

pub async fn update_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
    Json(req): Json<users::CreateUser>,
) -> impl IntoResponse {
    let (status, body) = update_user_inner(&state.pool, id, req).await;
    (status, Json(body))
}

pub async fn list_operators_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_operators_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn list_sessions_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_sessions_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn create_session_handler(
    State(state): State<Arc<HttpState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let req = match parse_intake_multipart(multipart).await {
        Ok(req) => req,
        Err(msg) => return (StatusCode::UNPROCESSABLE_ENTITY, Json(error_body(msg))),
    };
    let (status, body) = intake_inner(&state, req).await;
    (status, Json(body))
}

pub async fn ai_result_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = ai_result_inner(&state.pool, id).await;
    (status, Json(body))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state.pool, state.classifier.as_ref(), id).await;
    (status, Json(body))
}

pub async fn ai_status_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(ai_status_inner(state.classifier.as_ref()).await))
}

// ============================================================================
// Unit Tests — pure inner functions; DB-backed paths live in tests/
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auxilium_core::classifier::{ClassifierError, Verdict};

    struct StubClassifier {
        alive: bool,
    }

    #[async_trait]
    impl EmergencyClassifier for StubClassifier {
        async fn analyze(
            &self,
            _image_url: &str,
            _transcription: &str,
            _session_id: Option<i64>,
        ) -> Result<Verdict, ClassifierError> {
            Err(ClassifierError::Rejected("stub".into()))
        }

        async fn ping(&self) -> bool {
            self.alive
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn root_reports_liveness_message() {
        let body = root_inner();
        assert_eq!(body["message"], ROOT_MESSAGE);
    }

    #[test]
    fn models_info_lists_all_entities_and_statuses() {
        let body = models_info_inner();
        let models = body["models"].as_array().unwrap();
        assert_eq!(models.len(), 7);
        let statuses = body["session_statuses"].as_array().unwrap();
        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[0], "en_attente");
        assert_eq!(statuses[4], "cloture");
    }

    #[tokio::test]
    async fn ai_status_reports_available_classifier() {
        let body = ai_status_inner(&StubClassifier { alive: true }).await;
        assert_eq!(body["ai_available"], true);
        assert_eq!(body["message"], "Serveur IA connecté");
    }

    #[tokio::test]
    async fn ai_status_reports_unreachable_classifier() {
        let body = ai_status_inner(&StubClassifier { alive: false }).await;
        assert_eq!(body["ai_available"], false);
        assert_eq!(body["message"], "Serveur IA non disponible");
    }

    #[test]
    fn cors_layer_accepts_explicit_origins() {
        // Smoke test: both branches construct without panicking.
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["http://localhost:19006".to_string()]);
    }
}
