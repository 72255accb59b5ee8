//! Common types used throughout the SFU implementation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Maximum length of a caller-supplied room identifier, in bytes
pub const MAX_ROOM_ID_LEN: usize = 128;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(nanoid::nanoid!(12))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of one connected client (one signaling connection)
    EndpointId
);
opaque_id!(
    /// Identifier of a media-plane transport allocated by the engine
    TransportId
);
opaque_id!(
    /// Identifier of a published media stream
    ProducerId
);
opaque_id!(
    /// Identifier of a subscription to a producer
    ConsumerId
);

/// Caller-supplied room identifier.
///
/// Validated on construction: 1..=128 bytes, no control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidRequest("room id must not be empty".to_string()));
        }
        if id.len() > MAX_ROOM_ID_LEN {
            return Err(Error::InvalidRequest(format!(
                "room id exceeds {MAX_ROOM_ID_LEN} bytes"
            )));
        }
        if id.chars().any(char::is_control) {
            return Err(Error::InvalidRequest(
                "room id must not contain control characters".to_string(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RoomId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Media kind of a producer or consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_validation() {
        assert!(RoomId::parse("r1").is_ok());
        assert!(RoomId::parse("").is_err());
        assert!(RoomId::parse("a".repeat(MAX_ROOM_ID_LEN)).is_ok());
        assert!(RoomId::parse("a".repeat(MAX_ROOM_ID_LEN + 1)).is_err());
        assert!(RoomId::parse("bad\nroom").is_err());
    }

    #[test]
    fn test_room_id_deserialize_rejects_empty() {
        let ok: Result<RoomId, _> = serde_json::from_str("\"lobby\"");
        assert_eq!(ok.expect("valid room id").as_str(), "lobby");

        let err: Result<RoomId, _> = serde_json::from_str("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_media_kind_wire_format() {
        assert_eq!(serde_json::to_string(&MediaKind::Audio).expect("serialize"), "\"audio\"");
        let kind: MediaKind = serde_json::from_str("\"video\"").expect("deserialize");
        assert_eq!(kind, MediaKind::Video);
        assert!(serde_json::from_str::<MediaKind>("\"screen\"").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(EndpointId::generate(), EndpointId::generate());
        assert_eq!(ProducerId::generate().as_str().len(), 12);
    }
}
