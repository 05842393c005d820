//! Live quiz session management
//!
//! This module provides the `SessionHub` that owns every live session:
//! - Connection bookkeeping per session (via the websocket registry)
//! - Participant scores and answer history
//! - Session-wide statistics
//! - Derived views (analytics, leaderboard, end-of-session results)

pub mod analytics;
mod config;
mod hub;
mod ledger;
mod stats;

pub use analytics::{
    Leaderboard, LecturerSummary, ParticipantSummary, QuestionBreakdown, QuestionResponse,
    SessionAnalytics, StudentResult, StudentScore, DEFAULT_LEADERBOARD_LIMIT,
    STRUGGLING_THRESHOLD,
};
pub use config::{
    QuestionReleaseMode, SessionConfig, ALLOWED_ANSWER_TIMES, ALLOWED_TRANSCRIPTION_MINUTES,
};
pub use hub::{SessionHub, SessionState};
pub use ledger::{
    score_answer, AnswerInput, AnswerOutcome, AnswerRecord, Participant, ParticipantId,
    QuestionId, ScoreLedger, BASE_POINTS, MAX_SPEED_BONUS,
};
pub use stats::SessionStats;
