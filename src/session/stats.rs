use serde::{Deserialize, Serialize};

/// Running session-wide aggregate, updated on every question and answer
///
/// Derivable from the union of all participants' answer logs, but kept as a
/// running total so analytics snapshots stay O(1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Questions released to students
    pub questions_generated: u32,

    /// Answers recorded across all participants
    pub answers_received: u32,

    /// How many of those answers were correct
    pub correct_answers: u32,

    /// Sum of reported response times in milliseconds
    pub total_response_time_ms: u64,
}

impl SessionStats {
    pub(crate) fn record_question(&mut self) {
        self.questions_generated += 1;
    }

    pub(crate) fn record_answer(&mut self, is_correct: bool, response_time_ms: Option<u64>) {
        self.answers_received += 1;
        if is_correct {
            self.correct_answers += 1;
        }
        if let Some(ms) = response_time_ms {
            self.total_response_time_ms = self.total_response_time_ms.saturating_add(ms);
        }
    }
}
