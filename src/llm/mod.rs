//! Question generation from transcript chunks
//!
//! The generator is an external collaborator: it may return nothing, or fail
//! outright. Callers treat both cases the same way (an `error` broadcast and no
//! question recorded).

mod gemini;

pub use gemini::GeminiGenerator;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Candidates requested per transcript chunk
pub const CANDIDATES_PER_CHUNK: usize = 3;

/// Options every multiple-choice question must have
pub const OPTIONS_PER_QUESTION: usize = 4;

/// A generated question before it is released
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionCandidate {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl QuestionCandidate {
    /// Exactly four options and a non-empty question and answer
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == OPTIONS_PER_QUESTION
            && !self.question_text.trim().is_empty()
            && !self.correct_answer.trim().is_empty()
    }
}

/// Turns a transcript chunk into up to three question candidates
#[async_trait::async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_candidates(&self, transcript_chunk: &str) -> Result<Vec<QuestionCandidate>>;

    /// Get generator name for logging
    fn name(&self) -> &str;
}

/// Stand-in used when no LLM credentials are configured
#[derive(Debug, Default)]
pub struct DisabledGenerator;

#[async_trait::async_trait]
impl QuestionGenerator for DisabledGenerator {
    async fn generate_candidates(&self, _transcript_chunk: &str) -> Result<Vec<QuestionCandidate>> {
        anyhow::bail!("question generation is disabled (no LLM API key configured)")
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
