//! Read-only projections over ledger state.
//!
//! Everything here is a pure function of its arguments: the hub takes a
//! snapshot of the ledger under its session lock and hands it over, so these
//! views can be computed and shipped without holding any lock.

use super::ledger::{AnswerRecord, Participant, ParticipantId, QuestionId};
use super::stats::SessionStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entries on the live leaderboard
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Limit that keeps every participant, for podium/rank computations
pub const FULL_RANKING_LIMIT: usize = usize::MAX;

/// Accuracy below which a student is flagged to the lecturer
pub const STRUGGLING_THRESHOLD: f64 = 0.5;

const PODIUM_SIZE: usize = 3;

/// Live session-wide numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub session_id: String,
    pub active_students: usize,
    pub total_questions: u32,
    pub total_answers: u32,

    /// `None` until the first answer arrives; never reported as zero
    pub average_response_time_ms: Option<f64>,

    /// `None` until the first answer arrives; 0.0 means "all wrong"
    pub accuracy_percentage: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub student_id: ParticipantId,
    pub student_name: String,
    pub score: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub average_response_time_ms: Option<f64>,
}

impl StudentScore {
    fn from_participant(participant: &Participant) -> Self {
        Self {
            student_id: participant.id.clone(),
            student_name: participant.label(),
            score: participant.score,
            correct_answers: participant.correct_answers,
            total_answers: participant.total_answers,
            average_response_time_ms: participant.average_response_time_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub session_id: String,
    pub students: Vec<StudentScore>,
    pub timestamp: DateTime<Utc>,
}

/// A single student's end-of-session result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_id: ParticipantId,
    pub student_name: String,
    pub final_score: u32,

    /// 1-based position in the full ranking
    pub final_rank: usize,

    pub total_participants: usize,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub answers: Vec<AnswerRecord>,
}

/// Per-student line of the lecturer summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub rank: usize,
    pub student_id: ParticipantId,
    pub student_name: String,
    pub score: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub accuracy_percentage: Option<f64>,
    pub average_response_time_ms: Option<f64>,
}

/// One student's answer to one question, as shown to the lecturer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub student_id: ParticipantId,
    pub student_name: String,
    pub answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBreakdown {
    pub question_id: QuestionId,
    pub question_text: String,
    pub correct_answer: Option<String>,
    pub attempts: u32,
    pub correct: u32,
    pub accuracy_percentage: Option<f64>,
    pub responses: Vec<QuestionResponse>,
}

/// Everything the lecturer gets when the session ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LecturerSummary {
    pub session_id: String,
    pub total_participants: usize,
    pub total_questions: usize,
    pub session_duration_seconds: i64,
    pub overall_accuracy_percentage: Option<f64>,
    pub average_response_time_ms: Option<f64>,
    pub participants: Vec<ParticipantSummary>,
    pub questions: Vec<QuestionBreakdown>,
    pub top_three: Vec<StudentScore>,
    pub struggling_students: Vec<StudentScore>,
}

impl LecturerSummary {
    /// Summary of a session with no recorded state
    pub fn empty(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            total_participants: 0,
            total_questions: 0,
            session_duration_seconds: 0,
            overall_accuracy_percentage: None,
            average_response_time_ms: None,
            participants: Vec::new(),
            questions: Vec::new(),
            top_three: Vec::new(),
            struggling_students: Vec::new(),
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(part: u32, whole: u32) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some(part as f64 / whole as f64 * 100.0)
}

fn mean(total: u64, count: u32) -> Option<f64> {
    if count == 0 {
        return None;
    }
    Some(total as f64 / count as f64)
}

pub fn session_snapshot(
    session_id: &str,
    stats: &SessionStats,
    active_count: usize,
) -> SessionAnalytics {
    SessionAnalytics {
        session_id: session_id.to_string(),
        active_students: active_count,
        total_questions: stats.questions_generated,
        total_answers: stats.answers_received,
        average_response_time_ms: mean(stats.total_response_time_ms, stats.answers_received),
        accuracy_percentage: percentage(stats.correct_answers, stats.answers_received),
        timestamp: Utc::now(),
    }
}

/// Participants sorted by score, highest first; equal scores keep join order.
pub fn rank(participants: &[Participant]) -> Vec<&Participant> {
    let mut ranked: Vec<&Participant> = participants.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.join_order.cmp(&b.join_order))
    });
    ranked
}

pub fn leaderboard(session_id: &str, participants: &[Participant], limit: usize) -> Leaderboard {
    let students = rank(participants)
        .into_iter()
        .take(limit)
        .map(StudentScore::from_participant)
        .collect();

    Leaderboard {
        session_id: session_id.to_string(),
        students,
        timestamp: Utc::now(),
    }
}

/// Final result for `participant`, ranked against the full leaderboard
/// `ranking` (which must contain every participant).
pub fn student_result(participant: &Participant, ranking: &[StudentScore]) -> StudentResult {
    let final_rank = ranking
        .iter()
        .position(|s| s.student_id == participant.id)
        .map(|i| i + 1)
        .unwrap_or(ranking.len() + 1);

    StudentResult {
        student_id: participant.id.clone(),
        student_name: participant.label(),
        final_score: participant.score,
        final_rank,
        total_participants: ranking.len(),
        correct_answers: participant.correct_answers,
        total_answers: participant.total_answers,
        answers: participant.answers.clone(),
    }
}

/// Students who answered at least once with accuracy below `threshold`, in
/// leaderboard order.
pub fn struggling(ranking: &[StudentScore], threshold: f64) -> Vec<StudentScore> {
    ranking
        .iter()
        .filter(|s| {
            s.total_answers > 0
                && (s.correct_answers as f64 / s.total_answers as f64) < threshold
        })
        .cloned()
        .collect()
}

pub fn podium(leaderboard: &Leaderboard) -> Vec<StudentScore> {
    leaderboard.students.iter().take(PODIUM_SIZE).cloned().collect()
}

/// Build the lecturer's end-of-session report.
///
/// `question_log` fixes the order of the per-question breakdown; questions
/// that were answered but never logged as released are appended after it.
pub fn lecturer_summary(
    session_id: &str,
    participants: &[Participant],
    question_log: &[QuestionId],
    session_duration_seconds: i64,
) -> LecturerSummary {
    let full = leaderboard(session_id, participants, FULL_RANKING_LIMIT);
    let ranked = rank(participants);

    let summaries: Vec<ParticipantSummary> = ranked
        .iter()
        .enumerate()
        .map(|(i, p)| ParticipantSummary {
            rank: i + 1,
            student_id: p.id.clone(),
            student_name: p.label(),
            score: p.score,
            correct_answers: p.correct_answers,
            total_answers: p.total_answers,
            accuracy_percentage: p.accuracy().map(|a| round1(a * 100.0)),
            average_response_time_ms: p.average_response_time_ms(),
        })
        .collect();

    let mut order: Vec<QuestionId> = question_log.to_vec();
    let mut breakdowns: HashMap<QuestionId, QuestionBreakdown> = question_log
        .iter()
        .map(|id| {
            (
                id.clone(),
                QuestionBreakdown {
                    question_id: id.clone(),
                    question_text: String::new(),
                    correct_answer: None,
                    attempts: 0,
                    correct: 0,
                    accuracy_percentage: None,
                    responses: Vec::new(),
                },
            )
        })
        .collect();

    for participant in participants {
        for record in &participant.answers {
            let entry = breakdowns
                .entry(record.question_id.clone())
                .or_insert_with(|| {
                    order.push(record.question_id.clone());
                    QuestionBreakdown {
                        question_id: record.question_id.clone(),
                        question_text: String::new(),
                        correct_answer: None,
                        attempts: 0,
                        correct: 0,
                        accuracy_percentage: None,
                        responses: Vec::new(),
                    }
                });

            if entry.question_text.is_empty() {
                entry.question_text = record.question_text.clone();
            }
            if entry.correct_answer.is_none() {
                entry.correct_answer = Some(record.correct_answer.clone());
            }
            entry.attempts += 1;
            if record.is_correct {
                entry.correct += 1;
            }
            entry.responses.push(QuestionResponse {
                student_id: participant.id.clone(),
                student_name: participant.label(),
                answer: record.student_answer.clone(),
                is_correct: record.is_correct,
                points_earned: record.points_earned,
            });
        }
    }

    let questions: Vec<QuestionBreakdown> = order
        .iter()
        .filter_map(|id| breakdowns.remove(id))
        .map(|mut b| {
            b.accuracy_percentage = percentage(b.correct, b.attempts).map(round1);
            b
        })
        .collect();

    let (correct, answered, response_time) =
        participants
            .iter()
            .fold((0u32, 0u32, 0u64), |(c, t, rt), p| {
                (
                    c + p.correct_answers,
                    t + p.total_answers,
                    rt.saturating_add(p.total_response_time_ms),
                )
            });

    LecturerSummary {
        session_id: session_id.to_string(),
        total_participants: participants.len(),
        total_questions: question_log.len(),
        session_duration_seconds,
        overall_accuracy_percentage: percentage(correct, answered).map(round1),
        average_response_time_ms: mean(response_time, answered),
        participants: summaries,
        questions,
        top_three: podium(&full),
        struggling_students: struggling(&full.students, STRUGGLING_THRESHOLD),
    }
}
