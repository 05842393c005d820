//! WebSocket transport
//!
//! Lecturers and students connect to `/ws/{client_type}/{session_id}`. Each
//! connection becomes an [`Endpoint`]: a role plus an outbound queue drained by
//! the socket's writer task. The hub only ever talks to endpoints, never to
//! sockets directly.

pub mod broadcast;
mod endpoint;
pub mod handler;
pub mod messages;
mod registry;

pub use broadcast::BroadcastResult;
pub use endpoint::{ConnectionReceiver, ConnectionSender, Endpoint, EndpointId, Role, RoleFilter};
pub use messages::{
    AnswerSubmission, ClientMessage, PublishedQuestion, QuestionOption, ServerMessage,
};
pub use registry::{ConnectionRegistry, Departure};
