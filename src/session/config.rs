use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer windows a lecturer may pick, in seconds
pub const ALLOWED_ANSWER_TIMES: [u32; 5] = [20, 30, 45, 60, 90];

/// Transcription intervals a lecturer may pick, in minutes
pub const ALLOWED_TRANSCRIPTION_MINUTES: [f64; 5] = [0.33, 5.0, 7.0, 9.0, 12.0];

/// How generated questions reach students
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionReleaseMode {
    /// Lecturer picks one of the generated candidates
    #[default]
    Active,
    /// First candidate is released to students immediately
    Passive,
}

impl fmt::Display for QuestionReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

/// Configuration for a live quiz session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Time students get to answer each question
    /// Default: 30 seconds
    pub answer_time_seconds: u32,

    /// How often the lecturer client ships a transcript chunk
    /// Default: 300 seconds (5 minutes)
    pub transcription_interval_seconds: u32,

    pub question_release_mode: QuestionReleaseMode,
}

impl SessionConfig {
    /// Build a config from the lecturer-facing units, rejecting values the
    /// clients do not offer.
    pub fn from_request(
        answer_time_seconds: u32,
        transcription_interval_minutes: f64,
        question_release_mode: QuestionReleaseMode,
    ) -> HubResult<Self> {
        if !ALLOWED_ANSWER_TIMES.contains(&answer_time_seconds) {
            return Err(HubError::InvalidConfig(format!(
                "answer_time_seconds must be one of {:?}, got {}",
                ALLOWED_ANSWER_TIMES, answer_time_seconds
            )));
        }

        if !ALLOWED_TRANSCRIPTION_MINUTES
            .iter()
            .any(|m| (m - transcription_interval_minutes).abs() < f64::EPSILON)
        {
            return Err(HubError::InvalidConfig(format!(
                "transcription_interval_minutes must be one of {:?}, got {}",
                ALLOWED_TRANSCRIPTION_MINUTES, transcription_interval_minutes
            )));
        }

        Ok(Self {
            answer_time_seconds,
            transcription_interval_seconds: (transcription_interval_minutes * 60.0).round() as u32,
            question_release_mode,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            answer_time_seconds: 30,
            transcription_interval_seconds: 300, // 5 minutes
            question_release_mode: QuestionReleaseMode::Active,
        }
    }
}
