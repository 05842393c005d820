//! Document store seam
//!
//! Sessions and released questions live outside the hub. The hub itself only
//! ever needs a question's id, text, correct answer and explanation at answer
//! time; everything else here serves the HTTP API and the question pipeline.

mod memory;

pub use memory::MemoryStore;

use crate::session::SessionConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest transcript excerpt kept alongside a question
pub const TRANSCRIPT_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// A lecturer-created session as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Short join code students type in
    pub session_id: String,
    pub lecturer_name: String,
    pub course_name: String,
    pub config: SessionConfig,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMethod {
    #[default]
    #[serde(rename = "AI")]
    Ai,
}

/// A released multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub generated_by: GenerationMethod,
    pub created_at: DateTime<Utc>,

    /// Transcript chunk this question was generated from
    pub chunk_id: Option<String>,

    /// Excerpt of that chunk, see [`excerpt`]
    pub transcript_chunk: Option<String>,
}

/// Truncate a transcript chunk for storage: the first 200 characters followed
/// by `...` when anything was cut.
pub fn excerpt(chunk: &str) -> String {
    if chunk.chars().count() > TRANSCRIPT_EXCERPT_CHARS {
        let head: String = chunk.chars().take(TRANSCRIPT_EXCERPT_CHARS).collect();
        format!("{}...", head)
    } else {
        chunk.to_string()
    }
}

/// Session and question persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails if the id is already taken.
    async fn create_session(&self, record: SessionRecord) -> Result<()>;

    async fn session_exists(&self, session_id: &str) -> Result<bool>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    async fn get_session_config(&self, session_id: &str) -> Result<Option<SessionConfig>> {
        Ok(self.get_session(session_id).await?.map(|r| r.config))
    }

    async fn update_session_status(&self, session_id: &str, status: SessionStatus) -> Result<()>;

    async fn save_question(&self, session_id: &str, question: &Question) -> Result<()>;

    async fn get_question(&self, session_id: &str, question_id: &str) -> Result<Option<Question>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
