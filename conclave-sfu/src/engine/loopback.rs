//! In-process engine that negotiates nothing.
//!
//! Fabricates identifiers and negotiation blobs with the shape clients
//! expect, tracks producers so consumers can only attach to live ones, and
//! never moves media. Backs the tests and the development server.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{
    EngineError, EngineResult, MediaConsumer, MediaEngine, MediaProducer, MediaTransport,
    TransportOptions,
};
use crate::types::{ConsumerId, EndpointId, MediaKind, ProducerId, TransportId};

/// Network settings announced in fabricated ICE candidates
#[derive(Debug, Clone)]
pub struct LoopbackOptions {
    pub announced_ip: String,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            announced_ip: "127.0.0.1".to_string(),
            rtc_min_port: 40000,
            rtc_max_port: 49999,
        }
    }
}

/// State shared by the engine and every object it creates
struct EngineShared {
    options: LoopbackOptions,
    /// Live producers and their kinds
    producers: DashMap<ProducerId, MediaKind>,
    next_port: AtomicU16,
    next_ssrc: AtomicU32,
}

impl EngineShared {
    fn allocate_port(&self) -> u16 {
        let min = self.options.rtc_min_port;
        let span = self.options.rtc_max_port.saturating_sub(min).saturating_add(1);
        let offset = self.next_port.fetch_add(1, Ordering::Relaxed) % span.max(1);
        min.saturating_add(offset)
    }
}

pub struct LoopbackEngine {
    shared: Arc<EngineShared>,
}

impl LoopbackEngine {
    #[must_use]
    pub fn new(options: LoopbackOptions) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                options,
                producers: DashMap::new(),
                next_port: AtomicU16::new(0),
                next_ssrc: AtomicU32::new(1000),
            }),
        }
    }

    /// Number of producers that have not been closed
    #[must_use]
    pub fn live_producers(&self) -> usize {
        self.shared.producers.len()
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(LoopbackOptions::default())
    }
}

fn codecs() -> Value {
    json!([
        {
            "kind": "audio",
            "mimeType": "audio/opus",
            "clockRate": 48000,
            "channels": 2,
            "preferredPayloadType": 100
        },
        {
            "kind": "video",
            "mimeType": "video/VP8",
            "clockRate": 90000,
            "preferredPayloadType": 101,
            "parameters": { "x-google-start-bitrate": 1000 }
        }
    ])
}

fn fingerprint(seed: &str) -> String {
    Sha256::digest(seed.as_bytes())
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn rtp_capabilities(&self) -> EngineResult<Value> {
        Ok(json!({ "codecs": codecs(), "headerExtensions": [] }))
    }

    async fn create_transport(
        &self,
        endpoint: &EndpointId,
    ) -> EngineResult<Arc<dyn MediaTransport>> {
        let id = TransportId::generate();
        let port = self.shared.allocate_port();
        let options = TransportOptions {
            id: id.clone(),
            ice_parameters: json!({
                "usernameFragment": nanoid::nanoid!(16),
                "password": nanoid::nanoid!(32),
                "iceLite": true
            }),
            ice_candidates: json!([{
                "foundation": "udpcandidate",
                "priority": 1_076_302_079_u32,
                "ip": self.shared.options.announced_ip,
                "port": port,
                "protocol": "udp",
                "type": "host"
            }]),
            dtls_parameters: json!({
                "role": "auto",
                "fingerprints": [{
                    "algorithm": "sha-256",
                    "value": fingerprint(id.as_str())
                }]
            }),
        };
        debug!(transport_id = %id, client_id = %endpoint, port, "Loopback transport created");

        Ok(Arc::new(LoopbackTransport {
            options,
            shared: Arc::clone(&self.shared),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }))
    }
}

struct LoopbackTransport {
    options: TransportOptions,
    shared: Arc<EngineShared>,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl LoopbackTransport {
    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::new(format!(
                "transport {} is closed",
                self.options.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    fn id(&self) -> TransportId {
        self.options.id.clone()
    }

    fn options(&self) -> TransportOptions {
        self.options.clone()
    }

    async fn connect(&self, dtls_parameters: Value) -> EngineResult<()> {
        self.ensure_open()?;
        if !dtls_parameters.is_object() {
            return Err(EngineError::new("dtlsParameters must be an object"));
        }
        if self.connected.swap(true, Ordering::AcqRel) {
            return Err(EngineError::new(format!(
                "transport {} already connected",
                self.options.id
            )));
        }
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> EngineResult<Arc<dyn MediaProducer>> {
        self.ensure_open()?;
        if !rtp_parameters.is_object() {
            return Err(EngineError::new("rtpParameters must be an object"));
        }
        let id = ProducerId::generate();
        self.shared.producers.insert(id.clone(), kind);
        Ok(Arc::new(LoopbackProducer {
            id,
            kind,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
        paused: bool,
    ) -> EngineResult<Arc<dyn MediaConsumer>> {
        self.ensure_open()?;
        let kind = self
            .shared
            .producers
            .get(producer_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| EngineError::new(format!("producer {producer_id} is not live")))?;
        if !rtp_capabilities.is_object() {
            return Err(EngineError::new("rtpCapabilities must be an object"));
        }

        let codecs: Vec<Value> = codecs()
            .as_array()
            .map(|all| {
                all.iter()
                    .filter(|codec| codec["kind"] == kind.as_str())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let ssrc = self.shared.next_ssrc.fetch_add(1, Ordering::Relaxed);

        Ok(Arc::new(LoopbackConsumer {
            id: ConsumerId::generate(),
            producer_id: producer_id.clone(),
            kind,
            rtp_parameters: json!({
                "codecs": codecs,
                "encodings": [{ "ssrc": ssrc }],
                "rtcp": { "cname": nanoid::nanoid!(8) }
            }),
            paused: AtomicBool::new(paused),
        }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct LoopbackProducer {
    id: ProducerId,
    kind: MediaKind,
    shared: Arc<EngineShared>,
}

impl MediaProducer for LoopbackProducer {
    fn id(&self) -> ProducerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn close(&self) {
        self.shared.producers.remove(&self.id);
    }
}

struct LoopbackConsumer {
    id: ConsumerId,
    producer_id: ProducerId,
    kind: MediaKind,
    rtp_parameters: Value,
    paused: AtomicBool,
}

#[async_trait]
impl MediaConsumer for LoopbackConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn producer_id(&self) -> ProducerId {
        self.producer_id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn rtp_parameters(&self) -> Value {
        self.rtp_parameters.clone()
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    async fn resume(&self) -> EngineResult<()> {
        self.paused.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) {
        self.paused.store(true, Ordering::Release);
    }
}
