use super::endpoint::{Endpoint, EndpointId, RoleFilter};

/// What a disconnect did to the registry
#[derive(Debug)]
pub enum Departure {
    /// The endpoint was not registered; nothing changed
    Absent,
    Removed(Endpoint),
    /// The endpoint was removed and it was the last one
    SessionEmpty(Endpoint),
}

impl Departure {
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Absent => None,
            Self::Removed(e) | Self::SessionEmpty(e) => Some(e),
        }
    }

    pub fn session_empty(&self) -> bool {
        matches!(self, Self::SessionEmpty(_))
    }
}

/// Live endpoints of one session, in connect order.
///
/// Pure bookkeeping: no business state lives here.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    endpoints: Vec<Endpoint>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint, replacing any earlier registration with the same id
    pub fn connect(&mut self, endpoint: Endpoint) {
        match self.endpoints.iter_mut().find(|e| e.id == endpoint.id) {
            Some(existing) => *existing = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }

    /// Remove an endpoint. Removing an unknown endpoint is a no-op.
    pub fn disconnect(&mut self, endpoint_id: EndpointId) -> Departure {
        let Some(pos) = self.endpoints.iter().position(|e| e.id == endpoint_id) else {
            return Departure::Absent;
        };

        let endpoint = self.endpoints.remove(pos);
        if self.endpoints.is_empty() {
            Departure::SessionEmpty(endpoint)
        } else {
            Departure::Removed(endpoint)
        }
    }

    /// Attach a participant to a connected endpoint
    pub fn bind_participant(&mut self, endpoint_id: EndpointId, participant_id: &str) -> bool {
        match self.endpoints.iter_mut().find(|e| e.id == endpoint_id) {
            Some(endpoint) => {
                endpoint.participant_id = Some(participant_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, endpoint_id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == endpoint_id)
    }

    /// Whether any live endpoint is still bound to this participant
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.endpoints
            .iter()
            .any(|e| e.participant_id.as_deref() == Some(participant_id))
    }

    pub fn endpoints_for(&self, filter: RoleFilter) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| filter.matches(e.role))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
