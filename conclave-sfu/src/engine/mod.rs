//! Media engine contract
//!
//! The coordination core never touches RTP, ICE or DTLS itself. It drives a
//! media engine through these traits and passes negotiation blobs through
//! unmodified.

mod loopback;

pub use loopback::{LoopbackEngine, LoopbackOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::types::{ConsumerId, EndpointId, MediaKind, ProducerId, TransportId};

/// A media engine call was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Connection parameters of a freshly created transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub id: TransportId,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Router capability descriptor handed to clients
    async fn rtp_capabilities(&self) -> EngineResult<Value>;

    /// Allocate a transport on behalf of `endpoint`
    async fn create_transport(&self, endpoint: &EndpointId)
        -> EngineResult<Arc<dyn MediaTransport>>;
}

#[async_trait]
pub trait MediaTransport: Send + Sync {
    fn id(&self) -> TransportId;

    fn options(&self) -> TransportOptions;

    /// Complete the DTLS handshake
    async fn connect(&self, dtls_parameters: Value) -> EngineResult<()>;

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> EngineResult<Arc<dyn MediaProducer>>;

    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
        paused: bool,
    ) -> EngineResult<Arc<dyn MediaConsumer>>;

    fn close(&self);
}

pub trait MediaProducer: Send + Sync {
    fn id(&self) -> ProducerId;

    fn kind(&self) -> MediaKind;

    fn close(&self);
}

#[async_trait]
pub trait MediaConsumer: Send + Sync {
    fn id(&self) -> ConsumerId;

    fn producer_id(&self) -> ProducerId;

    fn kind(&self) -> MediaKind;

    fn rtp_parameters(&self) -> Value;

    fn paused(&self) -> bool;

    async fn resume(&self) -> EngineResult<()>;

    fn close(&self);
}
