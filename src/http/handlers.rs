use super::state::AppState;
use crate::error::HubError;
use crate::quiz::{StartSessionRequest, StartSessionResponse};
use crate::session::{
    Leaderboard, LecturerSummary, QuestionReleaseMode, SessionAnalytics,
    DEFAULT_LEADERBOARD_LIMIT,
};
use crate::store::SessionStatus;
use crate::ws::{handler, Role};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SelectQuestionRequest {
    pub session_id: String,
    pub chunk_id: String,
    pub question_index: usize,
}

#[derive(Debug, Serialize)]
pub struct SelectQuestionResponse {
    pub success: bool,
    pub question_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigResponse {
    pub session_id: String,
    pub lecturer_name: String,
    pub course_name: String,
    pub answer_time: u32,
    pub transcription_interval: u32,
    pub question_release_mode: QuestionReleaseMode,
    pub status: SessionStatus,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl HubError {
    fn status_code(&self) -> StatusCode {
        match self {
            HubError::SessionNotFound(_)
            | HubError::QuestionNotFound(_)
            | HubError::SelectionNotFound { .. } => StatusCode::NOT_FOUND,
            HubError::InvalidConfig(_)
            | HubError::UnknownParticipant(_)
            | HubError::DuplicateAnswer { .. } => StatusCode::BAD_REQUEST,
            HubError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            HubError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.quiz.hub().session_count().await,
    })
}

/// POST /start-session
/// Create a session and hand back its join code
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, HubError> {
    info!(
        "Starting session for {} ({})",
        req.course_name, req.lecturer_name
    );

    let response = state.quiz.start_session(req).await?;
    Ok(Json(response))
}

/// POST /select-question
/// Release the lecturer's pick among the offered candidates
pub async fn select_question(
    State(state): State<AppState>,
    Json(req): Json<SelectQuestionRequest>,
) -> Result<Json<SelectQuestionResponse>, HubError> {
    let question = state
        .quiz
        .select_question(&req.session_id, &req.chunk_id, req.question_index)
        .await?;

    Ok(Json(SelectQuestionResponse {
        success: true,
        question_id: question.id,
        message: "Question released to students".to_string(),
    }))
}

/// GET /sessions/:session_id/config
pub async fn get_session_config(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionConfigResponse>, HubError> {
    let record = state.quiz.session(&session_id).await?;

    Ok(Json(SessionConfigResponse {
        session_id: record.session_id,
        lecturer_name: record.lecturer_name,
        course_name: record.course_name,
        answer_time: record.config.answer_time_seconds,
        transcription_interval: record.config.transcription_interval_seconds,
        question_release_mode: record.config.question_release_mode,
        status: record.status,
    }))
}

/// GET /sessions/:session_id/analytics
pub async fn get_session_analytics(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionAnalytics>, HubError> {
    Ok(Json(state.quiz.analytics(&session_id).await?))
}

/// GET /sessions/:session_id/leaderboard?limit=N
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, HubError> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    Ok(Json(state.quiz.leaderboard(&session_id, limit).await?))
}

/// POST /sessions/:session_id/end
/// End the session; repeated calls return an empty summary
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<LecturerSummary>, HubError> {
    info!("Ending session {} via HTTP", session_id);
    Ok(Json(state.quiz.end_session(&session_id).await?))
}

/// GET /ws/:client_type/:session_id
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((client_type, session_id)): Path<(String, String)>,
) -> Response {
    let role = match client_type.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            warn!("Rejecting websocket upgrade: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })).into_response();
        }
    };

    let quiz = Arc::clone(&state.quiz);
    ws.on_upgrade(move |socket| handler::serve_socket(socket, quiz, role, session_id))
}
