//! Application layer around the hub
//!
//! Wires the session hub to its external collaborators: the document store
//! (sessions, questions) and the question generator. Every storage or LLM
//! failure is converted into a [`HubError`] here, so the transport layer only
//! ever deals with one error type.

use crate::config::SessionDefaults;
use crate::error::{HubError, HubResult};
use crate::llm::{QuestionCandidate, QuestionGenerator, CANDIDATES_PER_CHUNK};
use crate::session::{
    analytics, AnswerOutcome, Leaderboard, LecturerSummary, ParticipantId, QuestionReleaseMode,
    SessionAnalytics, SessionConfig, SessionHub, SessionState, SessionStats,
};
use crate::store::{
    excerpt, GenerationMethod, Question, SessionRecord, SessionStatus, SessionStore,
};
use crate::ws::{
    AnswerSubmission, Endpoint, EndpointId, PublishedQuestion, QuestionOption, RoleFilter,
    ServerMessage,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SESSION_CODE_LEN: usize = 6;
const SESSION_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 10;

/// Six uppercase alphanumerics, easy to type on a phone
pub fn generate_session_code() -> String {
    let mut rng = rand::rng();
    (0..SESSION_CODE_LEN)
        .map(|_| SESSION_CODE_CHARSET[rng.random_range(0..SESSION_CODE_CHARSET.len())] as char)
        .collect()
}

fn default_transcription_minutes() -> f64 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub lecturer_name: String,
    pub course_name: String,

    /// Falls back to the configured default when omitted
    #[serde(default)]
    pub answer_time_seconds: Option<u32>,

    #[serde(default = "default_transcription_minutes")]
    pub transcription_interval_minutes: f64,

    #[serde(default)]
    pub question_release_mode: QuestionReleaseMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub lecturer_name: String,
    pub course_name: String,
    pub answer_time: u32,
    pub transcription_interval: u32,
    pub question_release_mode: QuestionReleaseMode,
}

/// What happened to a transcript chunk
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Too short to be worth a generation call
    Skipped { length: usize },
    /// Passive mode: the first candidate went straight to students
    Released(Question),
    /// Active mode: candidates are waiting for the lecturer's pick
    Offered { chunk_id: String, count: usize },
}

#[derive(Debug)]
struct PendingChunk {
    session_id: String,
    candidates: Vec<QuestionCandidate>,
    transcript_chunk: String,
}

pub struct QuizService {
    hub: Arc<SessionHub>,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn QuestionGenerator>,

    /// Candidates offered to lecturers, by chunk id
    pending: Mutex<HashMap<String, PendingChunk>>,

    default_answer_time_seconds: u32,
    min_transcript_chars: usize,
}

impl QuizService {
    pub fn new(
        hub: Arc<SessionHub>,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn QuestionGenerator>,
        defaults: &SessionDefaults,
    ) -> Self {
        info!(
            "Quiz service using {} store and {} question generator",
            store.name(),
            generator.name()
        );

        Self {
            hub,
            store,
            generator,
            pending: Mutex::new(HashMap::new()),
            default_answer_time_seconds: defaults.default_answer_time_seconds,
            min_transcript_chars: defaults.min_transcript_chars,
        }
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create, persist and open a new session under a fresh join code
    pub async fn start_session(&self, req: StartSessionRequest) -> HubResult<StartSessionResponse> {
        let config = SessionConfig::from_request(
            req.answer_time_seconds
                .unwrap_or(self.default_answer_time_seconds),
            req.transcription_interval_minutes,
            req.question_release_mode,
        )?;

        let session_id = self.unique_session_code().await?;

        let record = SessionRecord {
            session_id: session_id.clone(),
            lecturer_name: req.lecturer_name.clone(),
            course_name: req.course_name.clone(),
            config: config.clone(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
        };
        self.store
            .create_session(record)
            .await
            .map_err(HubError::store)?;

        self.hub.open_session(&session_id, config.clone()).await;

        info!(
            "Session {} created for {} ({}, {} mode)",
            session_id, req.course_name, req.lecturer_name, config.question_release_mode
        );

        Ok(StartSessionResponse {
            session_id,
            lecturer_name: req.lecturer_name,
            course_name: req.course_name,
            answer_time: config.answer_time_seconds,
            transcription_interval: config.transcription_interval_seconds,
            question_release_mode: config.question_release_mode,
        })
    }

    async fn unique_session_code(&self) -> HubResult<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_session_code();
            let taken = self
                .store
                .session_exists(&code)
                .await
                .map_err(HubError::store)?;
            if !taken {
                return Ok(code);
            }
            warn!("Session code {} already taken, retrying", code);
        }

        Err(HubError::Store(
            "could not generate a unique session code".to_string(),
        ))
    }

    /// Stored session record; `SessionNotFound` if the code is unknown
    pub async fn session(&self, session_id: &str) -> HubResult<SessionRecord> {
        self.store
            .get_session(session_id)
            .await
            .map_err(HubError::store)?
            .ok_or_else(|| HubError::SessionNotFound(session_id.to_string()))
    }

    /// Make sure the hub tracks a stored, still-active session, opening it from
    /// the stored config if needed (e.g. after a restart).
    async fn ensure_open(&self, session_id: &str) -> HubResult<()> {
        match self.hub.state(session_id).await {
            Some(SessionState::Ended) => {
                return Err(HubError::SessionNotFound(session_id.to_string()))
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let record = self.session(session_id).await?;
        if record.status == SessionStatus::Ended {
            return Err(HubError::SessionNotFound(session_id.to_string()));
        }

        self.hub.open_session(session_id, record.config).await;
        Ok(())
    }

    /// The hub is tracking the session and it has not ended
    async fn ensure_live(&self, session_id: &str) -> HubResult<()> {
        match self.hub.state(session_id).await {
            Some(SessionState::Created | SessionState::Active) => Ok(()),
            Some(SessionState::Ended) | None => {
                Err(HubError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    /// Register a new connection with its session
    pub async fn connect(&self, session_id: &str, endpoint: Endpoint) -> HubResult<()> {
        self.ensure_open(session_id).await?;
        self.hub.connect(session_id, endpoint).await
    }

    pub async fn join(
        &self,
        session_id: &str,
        endpoint: Endpoint,
        name: &str,
    ) -> HubResult<ParticipantId> {
        self.hub.on_join(session_id, endpoint, name).await
    }

    pub async fn leave(&self, session_id: &str, endpoint_id: EndpointId) -> Option<ParticipantId> {
        self.hub.on_leave(session_id, endpoint_id).await
    }

    /// Turn a transcript chunk into questions.
    ///
    /// Passive sessions release the first candidate immediately; active
    /// sessions offer all candidates to the lecturers. A failed or empty
    /// generation is broadcast to the session as an `error`.
    pub async fn handle_transcript_chunk(
        &self,
        session_id: &str,
        transcript_chunk: &str,
    ) -> HubResult<ChunkOutcome> {
        self.ensure_live(session_id).await?;

        let length = transcript_chunk.trim().chars().count();
        if length < self.min_transcript_chars {
            info!(
                "Transcript chunk too short ({} chars), skipping question generation",
                length
            );
            return Ok(ChunkOutcome::Skipped { length });
        }

        let config = self.hub.config(session_id).await?;

        let candidates: Vec<QuestionCandidate> =
            match self.generator.generate_candidates(transcript_chunk).await {
                Ok(candidates) => candidates
                    .into_iter()
                    .filter(QuestionCandidate::is_well_formed)
                    .take(CANDIDATES_PER_CHUNK)
                    .collect(),
                Err(e) => {
                    error!("Question generation failed for session {}: {:#}", session_id, e);
                    return Err(self.generation_failed(session_id, format!("{:#}", e)).await);
                }
            };

        if candidates.is_empty() {
            warn!("Generator returned no usable questions for session {}", session_id);
            return Err(self
                .generation_failed(session_id, "no usable questions".to_string())
                .await);
        }

        let chunk_id = Uuid::new_v4().to_string();

        match config.question_release_mode {
            QuestionReleaseMode::Passive => {
                let Some(first) = candidates.into_iter().next() else {
                    return Err(HubError::GenerationFailed("no usable questions".to_string()));
                };
                let question = self
                    .release(session_id, &config, first, &chunk_id, transcript_chunk, true)
                    .await?;
                info!("Auto-released question {} in session {}", question.id, session_id);
                Ok(ChunkOutcome::Released(question))
            }
            QuestionReleaseMode::Active => {
                let count = candidates.len();
                let options = candidates
                    .iter()
                    .enumerate()
                    .map(|(index, c)| QuestionOption {
                        index,
                        question_text: c.question_text.clone(),
                        options: c.options.clone(),
                        correct_answer: c.correct_answer.clone(),
                    })
                    .collect();

                self.pending.lock().await.insert(
                    chunk_id.clone(),
                    PendingChunk {
                        session_id: session_id.to_string(),
                        candidates,
                        transcript_chunk: transcript_chunk.to_string(),
                    },
                );

                // The session may have ended while the generator was running
                if let Err(e) = self.ensure_live(session_id).await {
                    self.pending.lock().await.remove(&chunk_id);
                    return Err(e);
                }

                self.hub
                    .broadcast(
                        session_id,
                        RoleFilter::Lecturer,
                        ServerMessage::QuestionOptions {
                            chunk_id: chunk_id.clone(),
                            questions: options,
                            transcript_chunk: excerpt(transcript_chunk),
                        },
                    )
                    .await?;

                info!(
                    "Sent {} question options to lecturers of session {}",
                    count, session_id
                );
                Ok(ChunkOutcome::Offered { chunk_id, count })
            }
        }
    }

    async fn generation_failed(&self, session_id: &str, reason: String) -> HubError {
        if let Err(e) = self
            .hub
            .broadcast(
                session_id,
                RoleFilter::All,
                ServerMessage::error("Failed to generate question options from transcript chunk."),
            )
            .await
        {
            warn!("Could not report generation failure: {}", e);
        }
        HubError::GenerationFailed(reason)
    }

    /// Release the lecturer's pick among the candidates offered for `chunk_id`
    pub async fn select_question(
        &self,
        session_id: &str,
        chunk_id: &str,
        index: usize,
    ) -> HubResult<Question> {
        self.ensure_live(session_id).await?;

        let pending = {
            let mut pending = self.pending.lock().await;
            let valid = pending
                .get(chunk_id)
                .is_some_and(|p| p.session_id == session_id && index < p.candidates.len());
            if valid {
                pending.remove(chunk_id)
            } else {
                None
            }
        };

        let not_found = || HubError::SelectionNotFound {
            chunk_id: chunk_id.to_string(),
            index,
        };
        let pending = pending.ok_or_else(not_found)?;
        let transcript_chunk = pending.transcript_chunk;
        let candidate = pending
            .candidates
            .into_iter()
            .nth(index)
            .ok_or_else(not_found)?;

        let config = self.hub.config(session_id).await?;
        let question = self
            .release(session_id, &config, candidate, chunk_id, &transcript_chunk, false)
            .await?;

        self.hub
            .broadcast(
                session_id,
                RoleFilter::All,
                ServerMessage::QuestionSelected {
                    message: format!(
                        "Question {} has been selected and released to students",
                        index + 1
                    ),
                    chunk_id: chunk_id.to_string(),
                },
            )
            .await?;

        info!(
            "Lecturer selected question {} of chunk {} in session {}",
            index, chunk_id, session_id
        );
        Ok(question)
    }

    /// Persist a candidate as a question, push it to the session, and count it
    async fn release(
        &self,
        session_id: &str,
        config: &SessionConfig,
        candidate: QuestionCandidate,
        chunk_id: &str,
        transcript_chunk: &str,
        auto_released: bool,
    ) -> HubResult<Question> {
        self.ensure_live(session_id).await?;

        let question = Question {
            id: Uuid::new_v4().to_string(),
            question_text: candidate.question_text,
            options: candidate.options,
            correct_answer: candidate.correct_answer,
            explanation: candidate.explanation,
            generated_by: GenerationMethod::Ai,
            created_at: Utc::now(),
            chunk_id: Some(chunk_id.to_string()),
            transcript_chunk: Some(excerpt(transcript_chunk)),
        };

        self.store
            .save_question(session_id, &question)
            .await
            .map_err(HubError::store)?;

        self.hub
            .broadcast(
                session_id,
                RoleFilter::All,
                ServerMessage::NewQuestion {
                    question: PublishedQuestion {
                        id: question.id.clone(),
                        question_text: question.question_text.clone(),
                        options: question.options.clone(),
                        answer_time_seconds: config.answer_time_seconds,
                    },
                    auto_released,
                    question_start_time: Utc::now().to_rfc3339(),
                },
            )
            .await?;

        self.hub.on_question_generated(session_id, &question.id).await?;

        Ok(question)
    }

    /// Score a student's answer against the stored question
    pub async fn submit_answer(
        &self,
        session_id: &str,
        endpoint_id: EndpointId,
        submission: &AnswerSubmission,
    ) -> HubResult<AnswerOutcome> {
        let question = self
            .store
            .get_question(session_id, &submission.question_id)
            .await
            .map_err(HubError::store)?
            .ok_or_else(|| HubError::QuestionNotFound(submission.question_id.clone()))?;

        self.hub
            .on_answer_submitted(
                session_id,
                endpoint_id,
                &question,
                &submission.selected_option,
                submission.response_time_ms,
            )
            .await
    }

    /// Mark the session ended in the store and close it in the hub
    pub async fn end_session(&self, session_id: &str) -> HubResult<LecturerSummary> {
        self.session(session_id).await?;

        if let Err(e) = self
            .store
            .update_session_status(session_id, SessionStatus::Ended)
            .await
        {
            error!("Failed to mark session {} ended: {:#}", session_id, e);
        }

        let summary = self.hub.on_end_session(session_id).await;
        self.drop_pending(&[session_id.to_string()]).await;
        Ok(summary)
    }

    /// Reap idle sessions from the hub along with their unpicked candidates
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<String> {
        let reaped = self.hub.reap_idle(max_idle).await;
        self.drop_pending(&reaped).await;
        reaped
    }

    async fn drop_pending(&self, session_ids: &[String]) {
        if session_ids.is_empty() {
            return;
        }

        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, p| !session_ids.contains(&p.session_id));
        let dropped = before - pending.len();
        if dropped > 0 {
            debug!("Dropped {} unpicked question chunk(s)", dropped);
        }
    }

    /// Candidate chunks still waiting for a lecturer's pick
    pub async fn pending_chunks(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Live analytics; a stored session the hub is not tracking reports zeros
    pub async fn analytics(&self, session_id: &str) -> HubResult<SessionAnalytics> {
        self.session(session_id).await?;

        match self.hub.analytics(session_id).await {
            Err(HubError::SessionNotFound(_)) => Ok(analytics::session_snapshot(
                session_id,
                &SessionStats::default(),
                0,
            )),
            other => other,
        }
    }

    pub async fn leaderboard(&self, session_id: &str, limit: usize) -> HubResult<Leaderboard> {
        self.session(session_id).await?;

        match self.hub.leaderboard(session_id, limit).await {
            Err(HubError::SessionNotFound(_)) => Ok(analytics::leaderboard(session_id, &[], limit)),
            other => other,
        }
    }
}
