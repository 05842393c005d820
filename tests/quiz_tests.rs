// Integration tests for the question pipeline
//
// A scripted generator stands in for the LLM so that release modes,
// lecturer selection and failure handling can be checked end to end.

use anyhow::Result;
use qwiz_hub::config::SessionDefaults;
use qwiz_hub::llm::{QuestionCandidate, QuestionGenerator};
use qwiz_hub::quiz::{generate_session_code, ChunkOutcome, QuizService, StartSessionRequest};
use qwiz_hub::session::{QuestionReleaseMode, SessionHub};
use qwiz_hub::store::{GenerationMethod, MemoryStore, SessionStatus, SessionStore};
use qwiz_hub::ws::{AnswerSubmission, ConnectionReceiver, Endpoint, EndpointId, Role, ServerMessage};
use qwiz_hub::HubError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TRANSCRIPT: &str = "Photosynthesis converts light energy into chemical energy stored in glucose.";

struct ScriptedGenerator {
    candidates: Vec<QuestionCandidate>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn returning(candidates: Vec<QuestionCandidate>) -> Self {
        Self {
            candidates,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate_candidates(&self, _transcript_chunk: &str) -> Result<Vec<QuestionCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("quota exceeded");
        }
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn candidate(text: &str, correct: &str) -> QuestionCandidate {
    QuestionCandidate {
        question_text: text.to_string(),
        options: vec![
            "Glucose".to_string(),
            "Oxygen".to_string(),
            "Nitrogen".to_string(),
            "Water".to_string(),
        ],
        correct_answer: correct.to_string(),
        explanation: format!("{} is right", correct),
    }
}

fn three_candidates() -> Vec<QuestionCandidate> {
    vec![
        candidate("What stores the energy?", "Glucose"),
        candidate("What is released?", "Oxygen"),
        candidate("What is absorbed?", "Water"),
    ]
}

struct Fixture {
    quiz: QuizService,
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
}

fn fixture(generator: ScriptedGenerator) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(generator);
    let quiz = QuizService::new(
        Arc::new(SessionHub::new()),
        store.clone(),
        generator.clone(),
        &SessionDefaults::default(),
    );
    Fixture {
        quiz,
        store,
        generator,
    }
}

fn request(mode: QuestionReleaseMode) -> StartSessionRequest {
    StartSessionRequest {
        lecturer_name: "Dr. Green".to_string(),
        course_name: "Biology 101".to_string(),
        answer_time_seconds: Some(45),
        transcription_interval_minutes: 5.0,
        question_release_mode: mode,
    }
}

fn drain(rx: &mut ConnectionReceiver) -> Vec<Arc<ServerMessage>> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

fn find<'a>(messages: &'a [Arc<ServerMessage>], kind: &str) -> Option<&'a ServerMessage> {
    messages
        .iter()
        .map(|m| m.as_ref())
        .find(|m| m.kind() == kind)
}

/// Start a session with one lecturer and one joined student
async fn live_session(
    fx: &Fixture,
    mode: QuestionReleaseMode,
) -> Result<(String, ConnectionReceiver, EndpointId, ConnectionReceiver)> {
    let session_id = fx.quiz.start_session(request(mode)).await?.session_id;

    let (lecturer, lecturer_rx) = Endpoint::channel(Role::Lecturer);
    fx.quiz.connect(&session_id, lecturer).await?;

    let (student, student_rx) = Endpoint::channel(Role::Student);
    let student_id = student.id;
    fx.quiz.connect(&session_id, student.clone()).await?;
    fx.quiz.join(&session_id, student, "Ann").await?;

    Ok((session_id, lecturer_rx, student_id, student_rx))
}

#[test]
fn test_session_code_shape() {
    for _ in 0..50 {
        let code = generate_session_code();
        assert_eq!(code.len(), 6);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}

#[tokio::test]
async fn test_start_session_persists_record() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));

    let response = fx.quiz.start_session(request(QuestionReleaseMode::Passive)).await?;
    assert_eq!(response.answer_time, 45);
    assert_eq!(response.transcription_interval, 300);
    assert_eq!(response.question_release_mode, QuestionReleaseMode::Passive);

    let record = fx
        .store
        .get_session(&response.session_id)
        .await?
        .expect("session should be stored");
    assert_eq!(record.course_name, "Biology 101");
    assert_eq!(record.status, SessionStatus::Active);
    assert_eq!(record.config.answer_time_seconds, 45);
    assert!(fx.quiz.hub().is_open(&response.session_id).await);

    Ok(())
}

#[tokio::test]
async fn test_start_session_rejects_unsupported_values() {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));

    let mut bad_time = request(QuestionReleaseMode::Active);
    bad_time.answer_time_seconds = Some(25);
    let err = fx.quiz.start_session(bad_time).await.unwrap_err();
    assert!(matches!(err, HubError::InvalidConfig(_)));

    let mut bad_interval = request(QuestionReleaseMode::Active);
    bad_interval.transcription_interval_minutes = 3.0;
    let err = fx.quiz.start_session(bad_interval).await.unwrap_err();
    assert!(matches!(err, HubError::InvalidConfig(_)));

    assert_eq!(fx.quiz.hub().session_count().await, 0);
}

#[tokio::test]
async fn test_answer_time_defaults_when_omitted() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let mut req = request(QuestionReleaseMode::Active);
    req.answer_time_seconds = None;

    let response = fx.quiz.start_session(req).await?;
    assert_eq!(response.answer_time, 30);

    Ok(())
}

#[tokio::test]
async fn test_connect_to_unknown_session_fails() {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (endpoint, _rx) = Endpoint::channel(Role::Student);

    let err = fx.quiz.connect("ZZZZZZ", endpoint).await.unwrap_err();
    assert!(matches!(err, HubError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_passive_mode_auto_releases_first_candidate() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, mut lecturer_rx, student_id, mut student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;
    drain(&mut lecturer_rx);
    drain(&mut student_rx);

    let outcome = fx.quiz.handle_transcript_chunk(&session_id, TRANSCRIPT).await?;
    let question = match outcome {
        ChunkOutcome::Released(question) => question,
        other => panic!("expected a released question, got {:?}", other),
    };
    assert_eq!(question.question_text, "What stores the energy?");
    assert_eq!(question.transcript_chunk.as_deref(), Some(TRANSCRIPT));

    let messages = drain(&mut student_rx);
    match find(&messages, "new_question") {
        Some(ServerMessage::NewQuestion {
            question: published,
            auto_released,
            ..
        }) => {
            assert!(*auto_released);
            assert_eq!(published.id, question.id);
            assert_eq!(published.answer_time_seconds, 45);
            assert_eq!(published.options.len(), 4);
        }
        _ => panic!("student did not receive new_question"),
    }
    assert!(find(&messages, "question_options").is_none());

    assert!(fx.store.get_question(&session_id, &question.id).await?.is_some());
    assert_eq!(fx.quiz.analytics(&session_id).await?.total_questions, 1);

    let outcome = fx
        .quiz
        .submit_answer(
            &session_id,
            student_id,
            &AnswerSubmission {
                question_id: question.id.clone(),
                selected_option: "Glucose".to_string(),
                response_time_ms: Some(2000),
            },
        )
        .await?;
    assert!(outcome.is_correct);
    assert_eq!(outcome.points_earned, 130);

    Ok(())
}

#[tokio::test]
async fn test_active_mode_offers_candidates_then_releases_pick() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, mut lecturer_rx, _student_id, mut student_rx) =
        live_session(&fx, QuestionReleaseMode::Active).await?;
    drain(&mut lecturer_rx);
    drain(&mut student_rx);

    let outcome = fx.quiz.handle_transcript_chunk(&session_id, TRANSCRIPT).await?;
    let chunk_id = match outcome {
        ChunkOutcome::Offered { chunk_id, count } => {
            assert_eq!(count, 3);
            chunk_id
        }
        other => panic!("expected offered candidates, got {:?}", other),
    };

    let lecturer_messages = drain(&mut lecturer_rx);
    match find(&lecturer_messages, "question_options") {
        Some(ServerMessage::QuestionOptions {
            chunk_id: offered,
            questions,
            ..
        }) => {
            assert_eq!(offered, &chunk_id);
            assert_eq!(questions.len(), 3);
            assert_eq!(questions[1].index, 1);
        }
        _ => panic!("lecturer did not receive question_options"),
    }
    assert!(drain(&mut student_rx).is_empty());
    assert!(fx.store.questions(&session_id).await.is_empty());

    let question = fx.quiz.select_question(&session_id, &chunk_id, 1).await?;
    assert_eq!(question.question_text, "What is released?");
    assert_eq!(question.correct_answer, "Oxygen");

    let student_messages = drain(&mut student_rx);
    match find(&student_messages, "new_question") {
        Some(ServerMessage::NewQuestion { auto_released, .. }) => assert!(!*auto_released),
        _ => panic!("student did not receive new_question"),
    }
    assert!(find(&student_messages, "question_selected").is_some());
    assert_eq!(fx.store.questions(&session_id).await.len(), 1);

    // A chunk can only be picked from once
    let err = fx
        .quiz
        .select_question(&session_id, &chunk_id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SelectionNotFound { .. }));

    Ok(())
}

#[tokio::test]
async fn test_out_of_range_selection_keeps_candidates() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, _lecturer_rx, _student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Active).await?;

    let chunk_id = match fx.quiz.handle_transcript_chunk(&session_id, TRANSCRIPT).await? {
        ChunkOutcome::Offered { chunk_id, .. } => chunk_id,
        other => panic!("expected offered candidates, got {:?}", other),
    };

    let err = fx
        .quiz
        .select_question(&session_id, &chunk_id, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SelectionNotFound { index: 7, .. }));

    // Wrong session is rejected too
    assert!(fx.quiz.select_question("OTHER1", &chunk_id, 0).await.is_err());

    fx.quiz.select_question(&session_id, &chunk_id, 2).await?;

    Ok(())
}

#[tokio::test]
async fn test_generation_failure_is_broadcast() -> Result<()> {
    let fx = fixture(ScriptedGenerator::failing());
    let (session_id, mut lecturer_rx, _student_id, mut student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;
    drain(&mut lecturer_rx);
    drain(&mut student_rx);

    let err = fx
        .quiz
        .handle_transcript_chunk(&session_id, TRANSCRIPT)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::GenerationFailed(_)));

    let messages = drain(&mut lecturer_rx);
    match find(&messages, "error") {
        Some(ServerMessage::Error { message }) => {
            assert_eq!(message, "Failed to generate question options from transcript chunk.")
        }
        _ => panic!("lecturer did not receive an error"),
    }
    assert!(fx.store.questions(&session_id).await.is_empty());
    assert_eq!(fx.quiz.analytics(&session_id).await?.total_questions, 0);

    Ok(())
}

#[tokio::test]
async fn test_malformed_candidates_count_as_failure() -> Result<()> {
    let mut broken = candidate("Only three options?", "Glucose");
    broken.options.pop();
    let fx = fixture(ScriptedGenerator::returning(vec![broken]));
    let (session_id, _lecturer_rx, _student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;

    let err = fx
        .quiz
        .handle_transcript_chunk(&session_id, TRANSCRIPT)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::GenerationFailed(_)));

    Ok(())
}

#[tokio::test]
async fn test_short_chunk_is_skipped() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, _lecturer_rx, _student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;

    let outcome = fx
        .quiz
        .handle_transcript_chunk(&session_id, "   too short   ")
        .await?;
    assert_eq!(outcome, ChunkOutcome::Skipped { length: 9 });
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_answer_to_unknown_question() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, _lecturer_rx, student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;

    let err = fx
        .quiz
        .submit_answer(
            &session_id,
            student_id,
            &AnswerSubmission {
                question_id: "missing".to_string(),
                selected_option: "Glucose".to_string(),
                response_time_ms: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::QuestionNotFound(id) if id == "missing"));
    assert_eq!(fx.quiz.analytics(&session_id).await?.total_answers, 0);

    Ok(())
}

#[tokio::test]
async fn test_end_session_marks_store_and_blocks_new_connections() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, mut lecturer_rx, _student_id, mut student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;
    drain(&mut lecturer_rx);
    drain(&mut student_rx);

    let summary = fx.quiz.end_session(&session_id).await?;
    assert_eq!(summary.total_participants, 1);

    let record = fx.store.get_session(&session_id).await?.unwrap();
    assert_eq!(record.status, SessionStatus::Ended);
    assert!(record.ended_at.is_some());

    assert!(find(&drain(&mut student_rx), "session_ended").is_some());
    assert!(find(&drain(&mut lecturer_rx), "session_summary").is_some());

    let again = fx.quiz.end_session(&session_id).await?;
    assert_eq!(again.total_participants, 0);

    let (late, _rx) = Endpoint::channel(Role::Student);
    assert!(fx.quiz.connect(&session_id, late).await.is_err());

    let err = fx.quiz.end_session("NOPE00").await.unwrap_err();
    assert!(matches!(err, HubError::SessionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_ended_session_takes_no_more_questions() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, mut lecturer_rx, _student_id, mut student_rx) =
        live_session(&fx, QuestionReleaseMode::Active).await?;

    let chunk_id = match fx.quiz.handle_transcript_chunk(&session_id, TRANSCRIPT).await? {
        ChunkOutcome::Offered { chunk_id, .. } => chunk_id,
        other => panic!("expected offered candidates, got {:?}", other),
    };
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 1);

    fx.quiz.end_session(&session_id).await?;
    assert_eq!(fx.quiz.pending_chunks().await, 0);
    drain(&mut lecturer_rx);
    drain(&mut student_rx);

    let err = fx
        .quiz
        .handle_transcript_chunk(&session_id, TRANSCRIPT)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SessionNotFound(_)));
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 1);

    let err = fx
        .quiz
        .select_question(&session_id, &chunk_id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SessionNotFound(_)));

    assert!(fx.store.questions(&session_id).await.is_empty());
    assert!(drain(&mut lecturer_rx).is_empty());
    assert!(drain(&mut student_rx).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reaping_drops_unpicked_candidates() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (busy_id, _lecturer_rx, _student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Active).await?;
    let idle_id = fx
        .quiz
        .start_session(request(QuestionReleaseMode::Active))
        .await?
        .session_id;

    let mut chunks = Vec::new();
    for session_id in [&busy_id, &idle_id] {
        match fx.quiz.handle_transcript_chunk(session_id, TRANSCRIPT).await? {
            ChunkOutcome::Offered { chunk_id, .. } => chunks.push(chunk_id),
            other => panic!("expected offered candidates, got {:?}", other),
        }
    }
    assert_eq!(fx.quiz.pending_chunks().await, 2);

    // Only the session nobody is connected to goes away
    let reaped = fx.quiz.reap_idle(Duration::ZERO).await;
    assert_eq!(reaped, vec![idle_id.clone()]);
    assert_eq!(fx.quiz.pending_chunks().await, 1);

    let err = fx
        .quiz
        .select_question(&idle_id, &chunks[1], 0)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SessionNotFound(_)));

    fx.quiz.select_question(&busy_id, &chunks[0], 0).await?;
    assert_eq!(fx.quiz.pending_chunks().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_released_questions_are_marked_as_generated() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let (session_id, _lecturer_rx, _student_id, _student_rx) =
        live_session(&fx, QuestionReleaseMode::Passive).await?;

    let question = match fx.quiz.handle_transcript_chunk(&session_id, TRANSCRIPT).await? {
        ChunkOutcome::Released(question) => question,
        other => panic!("expected a released question, got {:?}", other),
    };
    assert_eq!(question.generated_by, GenerationMethod::Ai);

    let value = serde_json::to_value(&question)?;
    assert_eq!(value["generated_by"], "AI");

    Ok(())
}

#[tokio::test]
async fn test_views_for_stored_session_not_in_hub() -> Result<()> {
    let fx = fixture(ScriptedGenerator::returning(three_candidates()));
    let session_id = fx
        .quiz
        .start_session(request(QuestionReleaseMode::Active))
        .await?
        .session_id;

    // Nobody ever connected; drop it from the hub
    fx.quiz.hub().reap_idle(std::time::Duration::ZERO).await;
    assert!(!fx.quiz.hub().is_open(&session_id).await);

    let analytics = fx.quiz.analytics(&session_id).await?;
    assert_eq!(analytics.total_answers, 0);
    assert_eq!(analytics.accuracy_percentage, None);
    assert!(fx.quiz.leaderboard(&session_id, 10).await?.students.is_empty());

    // Connecting reopens it from the stored config
    let (lecturer, _rx) = Endpoint::channel(Role::Lecturer);
    fx.quiz.connect(&session_id, lecturer).await?;
    assert_eq!(
        fx.quiz.hub().config(&session_id).await?.answer_time_seconds,
        45
    );

    Ok(())
}
