pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod quiz;
pub mod session;
pub mod store;
pub mod ws;

pub use config::Config;
pub use error::{HubError, HubResult};
pub use http::{create_router, AppState};
pub use llm::{DisabledGenerator, GeminiGenerator, QuestionCandidate, QuestionGenerator};
pub use quiz::{ChunkOutcome, QuizService, StartSessionRequest, StartSessionResponse};
pub use session::{
    Leaderboard, LecturerSummary, Participant, QuestionReleaseMode, SessionAnalytics,
    SessionConfig, SessionHub, SessionState, SessionStats,
};
pub use store::{MemoryStore, Question, SessionRecord, SessionStatus, SessionStore};
pub use ws::{ClientMessage, Endpoint, Role, RoleFilter, ServerMessage};
