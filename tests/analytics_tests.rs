// Integration tests for the read-only session views
//
// These tests build ledger state directly and check the projections the hub
// ships to clients: snapshots, leaderboards, podium, results and the
// lecturer summary.

use anyhow::Result;
use qwiz_hub::session::analytics::{
    leaderboard, lecturer_summary, podium, rank, round1, session_snapshot, student_result,
    struggling, FULL_RANKING_LIMIT,
};
use qwiz_hub::session::{AnswerInput, ScoreLedger, SessionStats, StudentScore};

fn answer(question_id: &str, selected: &str, correct: &str, ms: Option<u64>) -> AnswerInput {
    AnswerInput {
        question_id: question_id.to_string(),
        question_text: format!("Text of {}", question_id),
        selected: selected.to_string(),
        correct: correct.to_string(),
        response_time_ms: ms,
    }
}

fn row(id: &str, correct: u32, total: u32) -> StudentScore {
    StudentScore {
        student_id: id.to_string(),
        student_name: id.to_string(),
        score: correct * 100,
        correct_answers: correct,
        total_answers: total,
        average_response_time_ms: None,
    }
}

/// A correct@500ms, B correct@6000ms, C incorrect
fn abc_ledger() -> Result<ScoreLedger> {
    let mut ledger = ScoreLedger::new();
    ledger.ensure_participant("A", Some("Alice"));
    ledger.ensure_participant("B", Some("Bob"));
    ledger.ensure_participant("C", Some("Cleo"));
    ledger.record_question("q1");

    ledger.record_answer("A", answer("q1", "yes", "yes", Some(500)))?;
    ledger.record_answer("B", answer("q1", "yes", "yes", Some(6000)))?;
    ledger.record_answer("C", answer("q1", "no", "yes", Some(700)))?;
    Ok(ledger)
}

#[test]
fn test_snapshot_reports_none_before_answers() {
    let snapshot = session_snapshot("S1", &SessionStats::default(), 0);

    assert_eq!(snapshot.session_id, "S1");
    assert_eq!(snapshot.total_answers, 0);
    assert_eq!(snapshot.average_response_time_ms, None);
    assert_eq!(snapshot.accuracy_percentage, None);
}

#[test]
fn test_snapshot_after_one_correct_answer() -> Result<()> {
    let mut ledger = ScoreLedger::new();
    ledger.ensure_participant("a", Some("A"));
    ledger.record_question("q1");
    ledger.record_answer("a", answer("q1", "x", "x", Some(800)))?;

    let snapshot = session_snapshot("S1", &ledger.snapshot_stats(), ledger.active_count());
    assert_eq!(snapshot.active_students, 1);
    assert_eq!(snapshot.total_questions, 1);
    assert_eq!(snapshot.total_answers, 1);
    assert_eq!(snapshot.accuracy_percentage, Some(100.0));
    assert_eq!(snapshot.average_response_time_ms, Some(800.0));

    Ok(())
}

#[test]
fn test_snapshot_all_wrong_is_zero_not_none() -> Result<()> {
    let mut ledger = ScoreLedger::new();
    ledger.ensure_participant("a", Some("A"));
    ledger.record_answer("a", answer("q1", "x", "y", None))?;

    let snapshot = session_snapshot("S1", &ledger.snapshot_stats(), 1);
    assert_eq!(snapshot.accuracy_percentage, Some(0.0));

    Ok(())
}

#[test]
fn test_abc_scenario() -> Result<()> {
    let ledger = abc_ledger()?;
    let participants = ledger.all_participants();

    let board = leaderboard("S1", &participants, FULL_RANKING_LIMIT);
    let standings: Vec<(&str, u32)> = board
        .students
        .iter()
        .map(|s| (s.student_id.as_str(), s.score))
        .collect();
    assert_eq!(standings, vec![("A", 145), ("B", 100), ("C", 0)]);

    let top: Vec<String> = podium(&board).into_iter().map(|s| s.student_id).collect();
    assert_eq!(top, vec!["A", "B", "C"]);

    let weak: Vec<String> = struggling(&board.students, 0.5)
        .into_iter()
        .map(|s| s.student_id)
        .collect();
    assert_eq!(weak, vec!["C"]);

    Ok(())
}

#[test]
fn test_equal_scores_keep_join_order() -> Result<()> {
    let mut ledger = ScoreLedger::new();
    ledger.ensure_participant("late", Some("Late"));
    ledger.ensure_participant("early", Some("Early"));
    ledger.ensure_participant("top", Some("Top"));

    ledger.record_answer("early", answer("q1", "x", "x", None))?;
    ledger.record_answer("late", answer("q1", "x", "x", None))?;
    ledger.record_answer("top", answer("q1", "x", "x", Some(0)))?;

    let participants = ledger.all_participants();
    let ids: Vec<&str> = rank(&participants).iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["top", "late", "early"]);

    Ok(())
}

#[test]
fn test_leaderboard_respects_limit() -> Result<()> {
    let ledger = abc_ledger()?;
    let board = leaderboard("S1", &ledger.all_participants(), 2);

    assert_eq!(board.students.len(), 2);
    assert_eq!(board.students[0].student_name, "Alice");
    assert_eq!(board.session_id, "S1");

    Ok(())
}

#[test]
fn test_struggling_threshold() {
    let ranking = vec![row("low", 3, 10), row("ok", 6, 10), row("idle", 0, 0)];

    let weak: Vec<String> = struggling(&ranking, 0.5)
        .into_iter()
        .map(|s| s.student_id)
        .collect();
    assert_eq!(weak, vec!["low"]);
}

#[test]
fn test_student_result_rank() -> Result<()> {
    let ledger = abc_ledger()?;
    let participants = ledger.all_participants();
    let board = leaderboard("S1", &participants, FULL_RANKING_LIMIT);

    let bob = participants.iter().find(|p| p.id == "B").unwrap();
    let result = student_result(bob, &board.students);

    assert_eq!(result.final_rank, 2);
    assert_eq!(result.total_participants, 3);
    assert_eq!(result.final_score, 100);
    assert_eq!(result.student_name, "Bob");
    assert_eq!(result.answers.len(), 1);

    Ok(())
}

#[test]
fn test_lecturer_summary() -> Result<()> {
    let mut ledger = abc_ledger()?;
    ledger.record_question("q2");
    ledger.record_answer("A", answer("q2", "b", "a", Some(1500)))?;

    let summary = lecturer_summary("S1", &ledger.all_participants(), ledger.question_log(), 90);

    assert_eq!(summary.total_participants, 3);
    assert_eq!(summary.total_questions, 2);
    assert_eq!(summary.session_duration_seconds, 90);

    // 2 of 4 answers correct
    assert_eq!(summary.overall_accuracy_percentage, Some(50.0));
    assert_eq!(summary.average_response_time_ms, Some(2175.0));

    assert_eq!(summary.participants[0].student_id, "A");
    assert_eq!(summary.participants[0].rank, 1);
    assert_eq!(summary.participants[0].accuracy_percentage, Some(50.0));
    assert_eq!(summary.participants[2].accuracy_percentage, Some(0.0));

    // Breakdown follows release order
    assert_eq!(summary.questions.len(), 2);
    let q1 = &summary.questions[0];
    assert_eq!(q1.question_id, "q1");
    assert_eq!(q1.attempts, 3);
    assert_eq!(q1.correct, 2);
    assert_eq!(q1.accuracy_percentage, Some(66.7));
    assert_eq!(q1.correct_answer.as_deref(), Some("yes"));
    assert_eq!(q1.responses.len(), 3);

    let q2 = &summary.questions[1];
    assert_eq!(q2.question_id, "q2");
    assert_eq!(q2.accuracy_percentage, Some(0.0));

    let top: Vec<&str> = summary.top_three.iter().map(|s| s.student_id.as_str()).collect();
    assert_eq!(top, vec!["A", "B", "C"]);

    let weak: Vec<&str> = summary
        .struggling_students
        .iter()
        .map(|s| s.student_id.as_str())
        .collect();
    assert_eq!(weak, vec!["C"]);

    Ok(())
}

#[test]
fn test_released_question_without_answers_is_listed() {
    let mut ledger = ScoreLedger::new();
    ledger.ensure_participant("a", Some("A"));
    ledger.record_question("q1");

    let summary = lecturer_summary("S1", &ledger.all_participants(), ledger.question_log(), 10);
    assert_eq!(summary.questions.len(), 1);
    assert_eq!(summary.questions[0].attempts, 0);
    assert_eq!(summary.questions[0].accuracy_percentage, None);
    assert_eq!(summary.overall_accuracy_percentage, None);
    assert!(summary.struggling_students.is_empty());
}

#[test]
fn test_round1() {
    assert_eq!(round1(66.666), 66.7);
    assert_eq!(round1(33.333), 33.3);
    assert_eq!(round1(100.0), 100.0);
}
