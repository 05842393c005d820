use crate::quiz::QuizService;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub quiz: Arc<QuizService>,

    /// CORS origins; empty allows any origin
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(quiz: Arc<QuizService>) -> Self {
        Self {
            quiz,
            allowed_origins: Arc::new(Vec::new()),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Arc::new(origins);
        self
    }
}
