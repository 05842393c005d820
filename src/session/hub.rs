use super::analytics::{
    self, Leaderboard, LecturerSummary, SessionAnalytics, DEFAULT_LEADERBOARD_LIMIT,
    FULL_RANKING_LIMIT,
};
use super::config::SessionConfig;
use super::ledger::{AnswerInput, AnswerOutcome, Participant, ParticipantId, ScoreLedger};
use crate::error::{HubError, HubResult};
use crate::store::Question;
use crate::ws::broadcast::{self, BroadcastResult};
use crate::ws::{ConnectionRegistry, Endpoint, EndpointId, RoleFilter, ServerMessage};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a hub session. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Ended,
}

/// Everything the hub knows about one session. Only ever touched under the
/// session's mutex.
struct LiveSession {
    config: SessionConfig,
    state: SessionState,
    started_at: DateTime<Utc>,
    last_activity: Instant,
    registry: ConnectionRegistry,
    ledger: ScoreLedger,
}

impl LiveSession {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Created,
            started_at: Utc::now(),
            last_activity: Instant::now(),
            registry: ConnectionRegistry::new(),
            ledger: ScoreLedger::new(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn snapshot(&self, session_id: &str) -> SessionAnalytics {
        analytics::session_snapshot(
            session_id,
            &self.ledger.snapshot_stats(),
            self.ledger.active_count(),
        )
    }

    /// Joins, questions and answers are refused once the session has ended
    fn ensure_live(&self, session_id: &str) -> HubResult<()> {
        if self.state == SessionState::Ended {
            return Err(HubError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    /// Response times beyond the answer window count as the full window
    fn clamp_response_time(&self, response_time_ms: Option<u64>) -> Option<u64> {
        let window_ms = u64::from(self.config.answer_time_seconds) * 1000;
        response_time_ms.map(|ms| ms.min(window_ms))
    }

    /// Leave the active set if no other endpoint still carries this participant
    fn release_participant(&mut self, participant_id: &str) -> bool {
        !self.registry.has_participant(participant_id) && self.ledger.mark_left(participant_id)
    }
}

type SessionSlot = Arc<Mutex<LiveSession>>;

/// Messages captured under the session lock, delivered after it is released
#[derive(Default)]
struct Outbox {
    deliveries: Vec<(Vec<Endpoint>, Arc<ServerMessage>)>,
}

impl Outbox {
    fn push(&mut self, endpoints: Vec<Endpoint>, message: ServerMessage) {
        if !endpoints.is_empty() {
            self.deliveries.push((endpoints, Arc::new(message)));
        }
    }
}

fn new_participant_id() -> ParticipantId {
    format!("student_{}", Uuid::new_v4().simple())
}

/// In-memory authority for every live session.
///
/// Each session sits behind its own mutex, so events for one session are
/// applied one at a time while different sessions proceed in parallel. Views
/// are computed inside the critical section; fan-out happens after it closes.
#[derive(Default)]
pub struct SessionHub {
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, session_id: &str) -> HubResult<SessionSlot> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| HubError::SessionNotFound(session_id.to_string()))
    }

    /// Start tracking a session. Returns `false` (and keeps the existing state)
    /// if it is already open.
    pub async fn open_session(&self, session_id: &str, config: SessionConfig) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return false;
        }

        sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(LiveSession::new(config))),
        );
        info!("Opened session {}", session_id);
        true
    }

    pub async fn is_open(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn state(&self, session_id: &str) -> Option<SessionState> {
        let slot = self.slot(session_id).await.ok()?;
        let session = slot.lock().await;
        Some(session.state)
    }

    pub async fn config(&self, session_id: &str) -> HubResult<SessionConfig> {
        let slot = self.slot(session_id).await?;
        let session = slot.lock().await;
        Ok(session.config.clone())
    }

    /// Register a freshly opened connection
    pub async fn connect(&self, session_id: &str, endpoint: Endpoint) -> HubResult<()> {
        let slot = self.slot(session_id).await?;
        let mut session = slot.lock().await;
        session.ensure_live(session_id)?;

        if session.state == SessionState::Created {
            session.state = SessionState::Active;
        }
        session.touch();

        info!(
            "Endpoint {} ({}) connected to session {}",
            endpoint.id, endpoint.role, session_id
        );
        session.registry.connect(endpoint);

        Ok(())
    }

    /// A student named themselves. The same name always maps to the same
    /// participant, so a reconnecting student picks up their previous score.
    pub async fn on_join(
        &self,
        session_id: &str,
        endpoint: Endpoint,
        claimed_name: &str,
    ) -> HubResult<ParticipantId> {
        let slot = self.slot(session_id).await?;

        let (outbox, participant_id) = {
            let mut session = slot.lock().await;
            session.ensure_live(session_id)?;
            session.touch();
            if session.state == SessionState::Created {
                session.state = SessionState::Active;
            }

            let name = claimed_name.trim();
            let endpoint_id = endpoint.id;
            let previous = session
                .registry
                .get(endpoint_id)
                .and_then(|e| e.participant_id.clone());

            let existing = if name.is_empty() {
                previous.clone()
            } else {
                session.ledger.participant_for_name(name)
            };
            let participant_id = existing.unwrap_or_else(new_participant_id);

            session.registry.connect(endpoint);
            session.registry.bind_participant(endpoint_id, &participant_id);
            let participant = session
                .ledger
                .ensure_participant(&participant_id, Some(name));

            let renamed_from = previous
                .filter(|p| *p != participant_id)
                .filter(|p| session.release_participant(p));

            info!(
                "Student {} ({}) joined session {}",
                participant.label(),
                participant_id,
                session_id
            );

            let everyone = session.registry.endpoints_for(RoleFilter::All);
            let mut outbox = Outbox::default();
            if let Some(previous) = renamed_from {
                info!("Student {} left session {} (renamed)", previous, session_id);
                outbox.push(
                    everyone.clone(),
                    ServerMessage::StudentLeft {
                        student_id: previous,
                    },
                );
            }
            outbox.push(
                everyone.clone(),
                ServerMessage::StudentJoined {
                    student_id: participant_id.clone(),
                    student_name: participant.label(),
                },
            );
            outbox.push(
                everyone,
                ServerMessage::AnalyticsUpdate {
                    analytics: session.snapshot(session_id),
                },
            );

            (outbox, participant_id)
        };

        self.deliver(&slot, session_id, outbox).await;
        Ok(participant_id)
    }

    /// A connection went away. Idempotent: unknown sessions and endpoints are
    /// ignored. Returns the participant that became inactive, if any.
    pub async fn on_leave(&self, session_id: &str, endpoint_id: EndpointId) -> Option<ParticipantId> {
        let slot = self.slot(session_id).await.ok()?;

        let (outbox, left, remove) = {
            let mut session = slot.lock().await;
            session.touch();

            let departure = session.registry.disconnect(endpoint_id);
            let mut outbox = Outbox::default();
            let mut left = None;

            if let Some(participant_id) = departure.endpoint().and_then(|e| e.participant_id.clone()) {
                if session.release_participant(&participant_id) {
                    info!("Student {} left session {}", participant_id, session_id);

                    let everyone = session.registry.endpoints_for(RoleFilter::All);
                    outbox.push(
                        everyone.clone(),
                        ServerMessage::StudentLeft {
                            student_id: participant_id.clone(),
                        },
                    );
                    outbox.push(
                        everyone,
                        ServerMessage::AnalyticsUpdate {
                            analytics: session.snapshot(session_id),
                        },
                    );
                    left = Some(participant_id);
                }
            }

            if departure.session_empty() {
                debug!("Session {} has no connections left", session_id);
            }

            let remove = departure.session_empty() && session.state == SessionState::Ended;
            (outbox, left, remove)
        };

        if remove {
            self.remove_session(session_id).await;
        }

        self.deliver(&slot, session_id, outbox).await;
        left
    }

    /// A question was released to students
    pub async fn on_question_generated(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> HubResult<SessionAnalytics> {
        let slot = self.slot(session_id).await?;

        let (outbox, snapshot) = {
            let mut session = slot.lock().await;
            session.ensure_live(session_id)?;
            session.touch();
            session.ledger.record_question(question_id);

            let snapshot = session.snapshot(session_id);
            let mut outbox = Outbox::default();
            outbox.push(
                session.registry.endpoints_for(RoleFilter::All),
                ServerMessage::AnalyticsUpdate {
                    analytics: snapshot.clone(),
                },
            );
            (outbox, snapshot)
        };

        self.deliver(&slot, session_id, outbox).await;
        Ok(snapshot)
    }

    /// Score one answer and push the new analytics and leaderboard.
    ///
    /// The submitting endpoint must have joined; on any error the ledger is
    /// left untouched and nothing is sent.
    pub async fn on_answer_submitted(
        &self,
        session_id: &str,
        endpoint_id: EndpointId,
        question: &Question,
        selected: &str,
        response_time_ms: Option<u64>,
    ) -> HubResult<AnswerOutcome> {
        let slot = self.slot(session_id).await?;

        let (outbox, outcome) = {
            let mut session = slot.lock().await;
            session.ensure_live(session_id)?;
            session.touch();

            let endpoint = session
                .registry
                .get(endpoint_id)
                .cloned()
                .ok_or_else(|| HubError::UnknownParticipant(endpoint_id.to_string()))?;
            let participant_id = endpoint
                .participant_id
                .clone()
                .ok_or_else(|| HubError::UnknownParticipant(endpoint_id.to_string()))?;

            let response_time_ms = session.clamp_response_time(response_time_ms);
            let outcome = session.ledger.record_answer(
                &participant_id,
                AnswerInput {
                    question_id: question.id.clone(),
                    question_text: question.question_text.clone(),
                    selected: selected.to_string(),
                    correct: question.correct_answer.clone(),
                    response_time_ms,
                },
            )?;

            debug!(
                "Session {}: {} answered {} ({} pts)",
                session_id, participant_id, question.id, outcome.points_earned
            );

            let participants = session.ledger.all_participants();
            let everyone = session.registry.endpoints_for(RoleFilter::All);
            let mut outbox = Outbox::default();
            outbox.push(
                everyone.clone(),
                ServerMessage::AnalyticsUpdate {
                    analytics: session.snapshot(session_id),
                },
            );
            outbox.push(
                everyone,
                ServerMessage::LeaderboardUpdate {
                    leaderboard: analytics::leaderboard(
                        session_id,
                        &participants,
                        DEFAULT_LEADERBOARD_LIMIT,
                    ),
                },
            );
            outbox.push(
                vec![endpoint],
                ServerMessage::AnswerResult {
                    question_id: question.id.clone(),
                    is_correct: outcome.is_correct,
                    correct_answer: question.correct_answer.clone(),
                    explanation: question.explanation.clone(),
                    points_earned: outcome.points_earned,
                    score: outcome.score,
                },
            );

            (outbox, outcome)
        };

        self.deliver(&slot, session_id, outbox).await;
        Ok(outcome)
    }

    /// Close the session: compute every result, ship them, then clear the
    /// ledger.
    ///
    /// Calling this again (or for a session the hub never saw) yields an empty
    /// summary rather than an error.
    pub async fn on_end_session(&self, session_id: &str) -> LecturerSummary {
        let Ok(slot) = self.slot(session_id).await else {
            debug!("End requested for unknown session {}", session_id);
            return LecturerSummary::empty(session_id);
        };

        let (outbox, summary, remove) = {
            let mut session = slot.lock().await;
            if session.state == SessionState::Ended {
                debug!("Session {} already ended", session_id);
                return LecturerSummary::empty(session_id);
            }

            let participants = session.ledger.all_participants();
            let duration = Utc::now()
                .signed_duration_since(session.started_at)
                .num_seconds();
            let summary = analytics::lecturer_summary(
                session_id,
                &participants,
                session.ledger.question_log(),
                duration,
            );

            let ranking = analytics::leaderboard(session_id, &participants, FULL_RANKING_LIMIT);
            let results: BTreeMap<String, _> = participants
                .iter()
                .map(|p| (p.id.clone(), analytics::student_result(p, &ranking.students)))
                .collect();

            let mut outbox = Outbox::default();
            outbox.push(
                session.registry.endpoints_for(RoleFilter::Student),
                ServerMessage::SessionEnded {
                    session_id: session_id.to_string(),
                    results,
                    top_three: analytics::podium(&ranking),
                },
            );
            outbox.push(
                session.registry.endpoints_for(RoleFilter::Lecturer),
                ServerMessage::SessionSummary {
                    summary: summary.clone(),
                },
            );

            // Views are computed above; only now is it safe to drop the state.
            session.ledger.clear();
            session.state = SessionState::Ended;
            session.touch();

            info!(
                "Session {} ended: {} participants, {} questions",
                session_id, summary.total_participants, summary.total_questions
            );

            (outbox, summary, session.registry.is_empty())
        };

        if remove {
            self.remove_session(session_id).await;
        }

        self.deliver(&slot, session_id, outbox).await;
        summary
    }

    pub async fn analytics(&self, session_id: &str) -> HubResult<SessionAnalytics> {
        let slot = self.slot(session_id).await?;
        let session = slot.lock().await;
        Ok(session.snapshot(session_id))
    }

    pub async fn leaderboard(&self, session_id: &str, limit: usize) -> HubResult<Leaderboard> {
        let slot = self.slot(session_id).await?;
        let participants = slot.lock().await.ledger.all_participants();
        Ok(analytics::leaderboard(session_id, &participants, limit))
    }

    /// Lecturer summary of the session so far, without ending it
    pub async fn summary(&self, session_id: &str) -> HubResult<LecturerSummary> {
        let slot = self.slot(session_id).await?;
        let session = slot.lock().await;
        let participants = session.ledger.all_participants();
        let duration = Utc::now()
            .signed_duration_since(session.started_at)
            .num_seconds();
        Ok(analytics::lecturer_summary(
            session_id,
            &participants,
            session.ledger.question_log(),
            duration,
        ))
    }

    pub async fn participants(&self, session_id: &str) -> HubResult<Vec<Participant>> {
        let slot = self.slot(session_id).await?;
        let participants = slot.lock().await.ledger.all_participants();
        Ok(participants)
    }

    /// Number of live endpoints in a session
    pub async fn connection_count(&self, session_id: &str) -> HubResult<usize> {
        let slot = self.slot(session_id).await?;
        let count = slot.lock().await.registry.len();
        Ok(count)
    }

    /// Send a message to part of a session
    pub async fn broadcast(
        &self,
        session_id: &str,
        filter: RoleFilter,
        message: ServerMessage,
    ) -> HubResult<BroadcastResult> {
        let slot = self.slot(session_id).await?;

        let outbox = {
            let mut session = slot.lock().await;
            session.touch();
            let mut outbox = Outbox::default();
            outbox.push(session.registry.endpoints_for(filter), message);
            outbox
        };

        Ok(self.deliver(&slot, session_id, outbox).await)
    }

    /// Send a message to one endpoint. Returns whether it was delivered.
    pub async fn send_to_endpoint(
        &self,
        session_id: &str,
        endpoint_id: EndpointId,
        message: ServerMessage,
    ) -> HubResult<bool> {
        let slot = self.slot(session_id).await?;

        let outbox = {
            let session = slot.lock().await;
            let mut outbox = Outbox::default();
            if let Some(endpoint) = session.registry.get(endpoint_id) {
                outbox.push(vec![endpoint.clone()], message);
            }
            outbox
        };

        let result = self.deliver(&slot, session_id, outbox).await;
        Ok(result.delivered > 0)
    }

    /// Drop sessions that have had no connections and no activity for
    /// `max_idle`. Returns the ids that were removed.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<String> {
        let slots: Vec<(String, SessionSlot)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut idle = Vec::new();
        for (session_id, slot) in slots {
            let session = slot.lock().await;
            if session.registry.is_empty() && session.last_activity.elapsed() >= max_idle {
                idle.push(session_id);
            }
        }

        if !idle.is_empty() {
            let mut sessions = self.sessions.write().await;
            for session_id in &idle {
                sessions.remove(session_id);
                info!("Reaped idle session {}", session_id);
            }
        }

        idle
    }

    async fn remove_session(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            info!("Removed session {}", session_id);
        }
    }

    /// Fan out everything in `outbox`, then drop endpoints that failed.
    async fn deliver(&self, slot: &SessionSlot, session_id: &str, outbox: Outbox) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        for (endpoints, message) in &outbox.deliveries {
            result.merge(broadcast::send_to(endpoints, message));
        }

        if !result.is_clean() {
            self.prune(slot, session_id, &result.failed).await;
        }

        result
    }

    /// Disconnect failed endpoints and tell the rest of the session about
    /// students who dropped out with them. Failures during that notice are
    /// left for the next delivery to prune.
    async fn prune(&self, slot: &SessionSlot, session_id: &str, failed: &[EndpointId]) {
        let (outbox, remove) = {
            let mut session = slot.lock().await;
            let mut emptied = false;
            let mut released = Vec::new();

            for endpoint_id in failed {
                let departure = session.registry.disconnect(*endpoint_id);
                let Some(endpoint) = departure.endpoint() else {
                    continue;
                };

                warn!(
                    "Dropping dead endpoint {} from session {}",
                    endpoint.id, session_id
                );
                if let Some(participant_id) = endpoint.participant_id.clone() {
                    if session.release_participant(&participant_id) {
                        released.push(participant_id);
                    }
                }
                emptied |= departure.session_empty();
            }

            let mut outbox = Outbox::default();
            if !released.is_empty() {
                let everyone = session.registry.endpoints_for(RoleFilter::All);
                for participant_id in released {
                    outbox.push(
                        everyone.clone(),
                        ServerMessage::StudentLeft {
                            student_id: participant_id,
                        },
                    );
                }
                outbox.push(
                    everyone,
                    ServerMessage::AnalyticsUpdate {
                        analytics: session.snapshot(session_id),
                    },
                );
            }

            (outbox, emptied && session.state == SessionState::Ended)
        };

        if remove {
            self.remove_session(session_id).await;
        }

        for (endpoints, message) in &outbox.deliveries {
            broadcast::send_to(endpoints, message);
        }
    }
}
