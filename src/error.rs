use thiserror::Error;

/// Errors surfaced by the session hub and the quiz service around it.
///
/// None of these are fatal: each one is scoped to a single session (and usually
/// a single endpoint) and is turned into an `error` message or an HTTP status by
/// the transport layer.
#[derive(Debug, Error)]
pub enum HubError {
    /// The session was never opened (or was already torn down)
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// An endpoint answered before sending its name
    #[error("participant for endpoint {0} has not joined")]
    UnknownParticipant(String),

    #[error("participant {participant_id} already answered question {question_id}")]
    DuplicateAnswer {
        participant_id: String,
        question_id: String,
    },

    #[error("question {0} not found")]
    QuestionNotFound(String),

    /// The lecturer picked a chunk/index that is not (or no longer) pending
    #[error("no pending question {index} for chunk {chunk_id}")]
    SelectionNotFound { chunk_id: String, index: usize },

    #[error("question generation failed: {0}")]
    GenerationFailed(String),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("store error: {0}")]
    Store(String),
}

impl HubError {
    /// Wrap a document store failure, keeping the full context chain.
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

pub type HubResult<T> = std::result::Result<T, HubError>;
