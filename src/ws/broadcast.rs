use super::endpoint::{Endpoint, EndpointId};
use super::messages::ServerMessage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub delivered: usize,

    /// Endpoints whose connection is gone; the caller drops them from the registry
    pub failed: Vec<EndpointId>,
}

impl BroadcastResult {
    pub fn merge(&mut self, other: BroadcastResult) {
        self.delivered += other.delivered;
        self.failed.extend(other.failed);
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deliver `message` to every endpoint independently.
///
/// A dead endpoint never stops delivery to the rest and is never retried; it
/// only shows up in `failed`.
pub fn send_to(endpoints: &[Endpoint], message: &Arc<ServerMessage>) -> BroadcastResult {
    let mut result = BroadcastResult::default();

    for endpoint in endpoints {
        if endpoint.send(Arc::clone(message)) {
            result.delivered += 1;
        } else {
            warn!(
                "Failed to deliver {} to endpoint {} ({})",
                message.kind(),
                endpoint.id,
                endpoint.role
            );
            result.failed.push(endpoint.id);
        }
    }

    debug!(
        "Broadcast {} to {} endpoint(s), {} failed",
        message.kind(),
        result.delivered,
        result.failed.len()
    );

    result
}
