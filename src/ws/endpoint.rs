use super::messages::ServerMessage;
use crate::session::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type EndpointId = Uuid;

/// Sender half of a connection's outbound queue.
/// The socket's writer task owns the receiver.
pub type ConnectionSender = mpsc::UnboundedSender<Arc<ServerMessage>>;
pub type ConnectionReceiver = mpsc::UnboundedReceiver<Arc<ServerMessage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lecturer,
    Student,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lecturer" => Ok(Self::Lecturer),
            "student" => Ok(Self::Student),
            other => Err(format!("unknown client type: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lecturer => write!(f, "lecturer"),
            Self::Student => write!(f, "student"),
        }
    }
}

/// Audience selector for fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Lecturer,
    Student,
}

impl RoleFilter {
    pub fn matches(self, role: Role) -> bool {
        match self {
            Self::All => true,
            Self::Lecturer => role == Role::Lecturer,
            Self::Student => role == Role::Student,
        }
    }
}

/// A live transport connection within one session
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Server-generated, never derived from the transport
    pub id: EndpointId,
    pub role: Role,

    /// Set once a student has sent their name
    pub participant_id: Option<ParticipantId>,

    sender: ConnectionSender,
}

impl Endpoint {
    pub fn new(role: Role, sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            participant_id: None,
            sender,
        }
    }

    /// Create an endpoint together with the receiver its writer task drains
    pub fn channel(role: Role) -> (Self, ConnectionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(role, tx), rx)
    }

    /// Queue a message; `false` means the connection is gone.
    pub fn send(&self, message: Arc<ServerMessage>) -> bool {
        self.sender.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
