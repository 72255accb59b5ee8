//! JSON wire protocol for the signaling WebSocket
//!
//! Client frames are `{"id", "method", "data"}` requests. The server answers
//! each one with a reply carrying the same id, and pushes room notifications
//! as `{"event", "data"}` frames.

use conclave_sfu::{
    ConsumerId, Error as SfuError, MediaKind, Notification, ProducerId, RoomId, TransportId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportRequest {
    pub transport_id: TransportId,
    pub dtls_parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    pub transport_id: TransportId,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    pub transport_id: TransportId,
    pub producer_id: ProducerId,
    pub rtp_capabilities: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeConsumerRequest {
    pub consumer_id: ConsumerId,
}

/// A validated client request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Join(JoinRequest),
    GetRtpCapabilities,
    CreateTransport,
    ConnectTransport(ConnectTransportRequest),
    Produce(ProduceRequest),
    Consume(ConsumeRequest),
    ResumeConsumer(ResumeConsumerRequest),
}

impl Request {
    /// Build a request from its method name and raw payload
    pub fn from_parts(method: &str, data: Value) -> Result<Self, DecodeError> {
        Ok(match method {
            "join" => Self::Join(payload(method, data)?),
            "getRtpCapabilities" => Self::GetRtpCapabilities,
            "createTransport" => Self::CreateTransport,
            "connectTransport" => Self::ConnectTransport(payload(method, data)?),
            "produce" => Self::Produce(payload(method, data)?),
            "consume" => Self::Consume(payload(method, data)?),
            "resumeConsumer" => Self::ResumeConsumer(payload(method, data)?),
            other => return Err(DecodeError::UnknownMethod(other.to_string())),
        })
    }

    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::GetRtpCapabilities => "getRtpCapabilities",
            Self::CreateTransport => "createTransport",
            Self::ConnectTransport(_) => "connectTransport",
            Self::Produce(_) => "produce",
            Self::Consume(_) => "consume",
            Self::ResumeConsumer(_) => "resumeConsumer",
        }
    }
}

fn payload<T: DeserializeOwned>(method: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        method: method.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Frame has no numeric id")]
    MissingId,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid {method} payload: {message}")]
    InvalidPayload { method: String, message: String },
}

/// A frame that could not be turned into a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFrame {
    /// Set when the frame carried a usable id
    pub id: Option<u64>,
    pub error: DecodeError,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    method: String,
    #[serde(default)]
    data: Value,
}

/// Decode one text frame into `(id, request)`
pub fn decode_request(text: &str) -> Result<(u64, Request), InvalidFrame> {
    let frame: Value = serde_json::from_str(text).map_err(|e| InvalidFrame {
        id: None,
        error: DecodeError::Malformed(e.to_string()),
    })?;

    let id = frame.get("id").and_then(Value::as_u64).ok_or(InvalidFrame {
        id: None,
        error: DecodeError::MissingId,
    })?;

    let envelope: RawEnvelope = serde_json::from_value(frame).map_err(|e| InvalidFrame {
        id: Some(id),
        error: DecodeError::Malformed(e.to_string()),
    })?;

    Request::from_parts(&envelope.method, envelope.data)
        .map(|request| (id, request))
        .map_err(|error| InvalidFrame {
            id: Some(id),
            error,
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL", message)
    }
}

impl From<&SfuError> for ErrorBody {
    fn from(err: &SfuError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<&DecodeError> for ErrorBody {
    fn from(err: &DecodeError) -> Self {
        Self::new("INVALID_REQUEST", err.to_string())
    }
}

/// Answer to one request. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    #[must_use]
    pub fn ok(id: u64, data: Value) -> Self {
        Self {
            id: Some(id),
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Option<u64>, error: ErrorBody) -> Self {
        Self {
            id,
            data: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Any frame the server sends
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Reply(Reply),
    Notification(Notification),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
