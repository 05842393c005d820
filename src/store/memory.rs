use super::{Question, SessionRecord, SessionStatus, SessionStore};
use anyhow::{bail, Result};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct StoredSession {
    record: SessionRecord,
    questions: HashMap<String, Question>,
}

/// Process-local document store
///
/// Holds sessions and their questions in memory. Used when no external store
/// is configured, and by the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Questions saved for a session, oldest first
    pub async fn questions(&self, session_id: &str) -> Vec<Question> {
        let sessions = self.sessions.read().await;
        let mut questions: Vec<Question> = sessions
            .get(session_id)
            .map(|s| s.questions.values().cloned().collect())
            .unwrap_or_default();
        questions.sort_by_key(|q| q.created_at);
        questions
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, record: SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&record.session_id) {
            bail!("session {} already exists", record.session_id);
        }

        sessions.insert(
            record.session_id.clone(),
            StoredSession {
                record,
                questions: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.read().await.contains_key(session_id))
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map(|s| s.record.clone()))
    }

    async fn update_session_status(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(session_id) else {
            bail!("session {} not found", session_id);
        };

        stored.record.status = status;
        if status == SessionStatus::Ended && stored.record.ended_at.is_none() {
            stored.record.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn save_question(&self, session_id: &str, question: &Question) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(session_id) else {
            bail!("session {} not found", session_id);
        };

        stored
            .questions
            .insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn get_question(&self, session_id: &str, question_id: &str) -> Result<Option<Question>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|s| s.questions.get(question_id))
            .cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
