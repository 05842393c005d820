//! HTTP API for lecturer tooling and the websocket entry point
//!
//! - GET /health - Health check
//! - POST /start-session - Create a session and get its join code
//! - POST /select-question - Release one of the offered candidates
//! - GET /sessions/:session_id/config - Stored session settings
//! - GET /sessions/:session_id/analytics - Live analytics snapshot
//! - GET /sessions/:session_id/leaderboard - Current ranking
//! - POST /sessions/:session_id/end - End the session, returns the summary
//! - GET /ws/:client_type/:session_id - WebSocket upgrade (lecturer | student)

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::AppState;
