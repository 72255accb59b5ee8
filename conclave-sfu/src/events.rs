//! Server-initiated room notifications

use serde::{Deserialize, Serialize};

use crate::types::{EndpointId, MediaKind, ProducerId};

/// A peer entering or leaving a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEvent {
    pub client_id: EndpointId,
}

/// A producer visible to room peers.
///
/// Used both for `newProducer` notifications and for the
/// `existingProducers` list returned by `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub client_id: EndpointId,
    pub kind: MediaKind,
}

/// Notification delivered to every room member except the originator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Notification {
    UserJoined(PeerEvent),
    UserLeft(PeerEvent),
    NewProducer(ProducerInfo),
}

impl Notification {
    #[must_use]
    pub fn user_joined(client_id: EndpointId) -> Self {
        Self::UserJoined(PeerEvent { client_id })
    }

    #[must_use]
    pub fn user_left(client_id: EndpointId) -> Self {
        Self::UserLeft(PeerEvent { client_id })
    }

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::UserJoined(_) => "userJoined",
            Self::UserLeft(_) => "userLeft",
            Self::NewProducer(_) => "newProducer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_wire_format() {
        let joined = Notification::user_joined(EndpointId::from("b"));
        assert_eq!(
            serde_json::to_value(&joined).unwrap(),
            json!({"event": "userJoined", "data": {"clientId": "b"}})
        );

        let produced = Notification::NewProducer(ProducerInfo {
            producer_id: ProducerId::from("p1"),
            client_id: EndpointId::from("a"),
            kind: MediaKind::Audio,
        });
        assert_eq!(
            serde_json::to_value(&produced).unwrap(),
            json!({
                "event": "newProducer",
                "data": {"producerId": "p1", "clientId": "a", "kind": "audio"}
            })
        );
        assert_eq!(produced.event_type(), "newProducer");
    }
}
