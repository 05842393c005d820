use super::stats::SessionStats;
use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type ParticipantId = String;
pub type QuestionId = String;

/// Points for any correct answer
pub const BASE_POINTS: u32 = 100;

/// Largest speed bonus; shrinks by one point per 100ms of response time
pub const MAX_SPEED_BONUS: u32 = 50;

/// Points awarded for one answer.
///
/// A correct answer earns `100 + max(0, 50 - floor(ms / 100))`, or a flat 100
/// when the client did not report a response time. Wrong answers earn nothing.
pub fn score_answer(is_correct: bool, response_time_ms: Option<u64>) -> u32 {
    if !is_correct {
        return 0;
    }

    let bonus = match response_time_ms {
        Some(ms) => {
            let penalty = ms / 100;
            (MAX_SPEED_BONUS as u64).saturating_sub(penalty) as u32
        }
        None => 0,
    };

    BASE_POINTS + bonus
}

/// One submitted answer; never mutated once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub question_text: String,
    pub student_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
    pub response_time_ms: Option<u64>,
}

/// A student's running state within one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,

    /// Name the student joined with, if any was ever sent
    pub display_name: Option<String>,

    /// Position in join order; breaks leaderboard ties
    pub join_order: u64,

    pub score: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub total_response_time_ms: u64,

    /// Answers in submission order
    pub answers: Vec<AnswerRecord>,
}

impl Participant {
    fn new(id: ParticipantId, display_name: Option<String>, join_order: u64) -> Self {
        Self {
            id,
            display_name,
            join_order,
            score: 0,
            correct_answers: 0,
            total_answers: 0,
            total_response_time_ms: 0,
            answers: Vec::new(),
        }
    }

    /// Name to show on leaderboards: the display name, or `Student <last 4 of id>`
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => {
                let chars: Vec<char> = self.id.chars().collect();
                let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
                format!("Student {}", tail)
            }
        }
    }

    /// Mean response time over all answers, `None` before the first answer
    pub fn average_response_time_ms(&self) -> Option<f64> {
        if self.total_answers == 0 {
            return None;
        }
        Some(self.total_response_time_ms as f64 / self.total_answers as f64)
    }

    /// Fraction of correct answers, `None` before the first answer
    pub fn accuracy(&self) -> Option<f64> {
        if self.total_answers == 0 {
            return None;
        }
        Some(self.correct_answers as f64 / self.total_answers as f64)
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }
}

/// What the caller knows about an answer at submission time
#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub question_id: QuestionId,
    pub question_text: String,
    pub selected: String,
    pub correct: String,
    pub response_time_ms: Option<u64>,
}

/// Result of recording one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub participant_id: ParticipantId,
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub points_earned: u32,

    /// Cumulative score after this answer
    pub score: u32,
}

/// Per-session score state: participants, their answer logs, and the
/// session-wide running aggregate.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    participants: HashMap<ParticipantId, Participant>,
    by_name: HashMap<String, ParticipantId>,
    active: HashSet<ParticipantId>,
    stats: SessionStats,
    question_log: Vec<QuestionId>,
    next_join_order: u64,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Participant previously registered under `name`, if any
    pub fn participant_for_name(&self, name: &str) -> Option<ParticipantId> {
        self.by_name.get(name.trim()).cloned()
    }

    /// Create the participant on first sight, otherwise return the existing
    /// state untouched apart from the display name.
    ///
    /// Either way the participant is (again) counted as active.
    pub fn ensure_participant(
        &mut self,
        participant_id: &str,
        display_name: Option<&str>,
    ) -> Participant {
        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let participant = if let Some(existing) = self.participants.get_mut(participant_id) {
            if let Some(name) = &name {
                if existing.display_name.as_ref() != Some(name) {
                    if let Some(old) = existing.display_name.replace(name.clone()) {
                        self.by_name.remove(&old);
                    }
                }
            }
            existing.clone()
        } else {
            let participant =
                Participant::new(participant_id.to_string(), name.clone(), self.next_join_order);
            self.next_join_order += 1;
            self.participants
                .insert(participant_id.to_string(), participant.clone());
            participant
        };

        if let Some(name) = name {
            self.by_name.insert(name, participant_id.to_string());
        }
        self.active.insert(participant_id.to_string());

        participant
    }

    /// Record one answer and fold it into the participant's and the session's
    /// aggregates.
    ///
    /// Nothing is mutated when the participant is unknown or has already
    /// answered this question.
    pub fn record_answer(
        &mut self,
        participant_id: &str,
        input: AnswerInput,
    ) -> HubResult<AnswerOutcome> {
        let participant = self
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| HubError::UnknownParticipant(participant_id.to_string()))?;

        if participant.has_answered(&input.question_id) {
            return Err(HubError::DuplicateAnswer {
                participant_id: participant_id.to_string(),
                question_id: input.question_id,
            });
        }

        let is_correct = input.selected == input.correct;
        let points = score_answer(is_correct, input.response_time_ms);

        participant.total_answers += 1;
        if is_correct {
            participant.correct_answers += 1;
        }
        participant.score += points;
        if let Some(ms) = input.response_time_ms {
            participant.total_response_time_ms =
                participant.total_response_time_ms.saturating_add(ms);
        }
        participant.answers.push(AnswerRecord {
            question_id: input.question_id.clone(),
            question_text: input.question_text,
            student_answer: input.selected,
            correct_answer: input.correct,
            is_correct,
            points_earned: points,
            response_time_ms: input.response_time_ms,
        });

        self.stats.record_answer(is_correct, input.response_time_ms);

        Ok(AnswerOutcome {
            participant_id: participant_id.to_string(),
            question_id: input.question_id,
            is_correct,
            points_earned: points,
            score: participant.score,
        })
    }

    /// Count a released question
    pub fn record_question(&mut self, question_id: &str) {
        self.stats.record_question();
        self.question_log.push(question_id.to_string());
    }

    /// Drop the participant from the active set; scores and answers are kept
    /// so a rejoin under the same name picks them up again.
    pub fn mark_left(&mut self, participant_id: &str) -> bool {
        self.active.remove(participant_id)
    }

    pub fn is_active(&self, participant_id: &str) -> bool {
        self.active.contains(participant_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn snapshot_stats(&self) -> SessionStats {
        self.stats
    }

    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    /// Every participant ever seen this session, in join order
    pub fn all_participants(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants.values().cloned().collect();
        all.sort_by_key(|p| p.join_order);
        all
    }

    /// Released question ids, in release order
    pub fn question_log(&self) -> &[QuestionId] {
        &self.question_log
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty() && self.question_log.is_empty()
    }

    /// Wipe all state. Only called at session end, after every view has been
    /// computed.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.by_name.clear();
        self.active.clear();
        self.stats = SessionStats::default();
        self.question_log.clear();
        self.next_join_order = 0;
    }
}
