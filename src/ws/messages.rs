use crate::session::{
    Leaderboard, LecturerSummary, SessionAnalytics, StudentResult, StudentScore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer payload sent by a student client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub selected_option: String,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

/// Messages received from clients, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Student announces (or re-announces) their display name
    StudentName { name: String },

    /// Lecturer ships a slice of the live transcript
    TranscriptChunk {
        chunk: String,
        #[serde(default)]
        timestamp: Option<String>,
    },

    AnswerSubmission { data: AnswerSubmission },

    EndSession,
}

/// A question as released to students (no answer attached)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedQuestion {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub answer_time_seconds: u32,
}

/// A generated candidate offered to the lecturer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub index: usize,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Messages pushed to clients, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    StudentJoined {
        student_id: String,
        student_name: String,
    },

    StudentLeft {
        student_id: String,
    },

    AnalyticsUpdate {
        analytics: SessionAnalytics,
    },

    LeaderboardUpdate {
        leaderboard: Leaderboard,
    },

    NewQuestion {
        question: PublishedQuestion,
        auto_released: bool,
        question_start_time: String,
    },

    QuestionOptions {
        chunk_id: String,
        questions: Vec<QuestionOption>,
        transcript_chunk: String,
    },

    QuestionSelected {
        message: String,
        chunk_id: String,
    },

    /// Private reply to the student who answered
    AnswerResult {
        question_id: String,
        is_correct: bool,
        correct_answer: String,
        explanation: String,
        points_earned: u32,
        score: u32,
    },

    /// Sent to students: every participant's final result, keyed by student id
    SessionEnded {
        session_id: String,
        results: BTreeMap<String, StudentResult>,
        top_three: Vec<StudentScore>,
    },

    /// Sent to lecturers
    SessionSummary {
        summary: LecturerSummary,
    },

    TranscriptReceived {
        chunk_length: usize,
        timestamp: Option<String>,
    },

    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of this message, as found in its `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StudentJoined { .. } => "student_joined",
            Self::StudentLeft { .. } => "student_left",
            Self::AnalyticsUpdate { .. } => "analytics_update",
            Self::LeaderboardUpdate { .. } => "leaderboard_update",
            Self::NewQuestion { .. } => "new_question",
            Self::QuestionOptions { .. } => "question_options",
            Self::QuestionSelected { .. } => "question_selected",
            Self::AnswerResult { .. } => "answer_result",
            Self::SessionEnded { .. } => "session_ended",
            Self::SessionSummary { .. } => "session_summary",
            Self::TranscriptReceived { .. } => "transcript_received",
            Self::Error { .. } => "error",
        }
    }
}
