//! SFU Manager - process-wide owner of room and media state
//!
//! This module provides:
//! - The room registry and producer directory behind a single lock
//! - Lookup tables for engine transports, producers and consumers
//! - Session creation for new connections
//! - Room snapshots and global statistics
//! - Background cleanup of empty rooms

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, NotificationReceiver};
use crate::config::SfuConfig;
use crate::directory::ProducerDirectory;
use crate::engine::{MediaConsumer, MediaEngine, MediaProducer, MediaTransport};
use crate::error::{Error, Result};
use crate::registry::RoomRegistry;
use crate::session::SignalingSession;
use crate::types::{ConsumerId, EndpointId, MediaKind, ProducerId, RoomId, TransportId};

/// Membership and ownership state that must change atomically.
///
/// Only ever locked for synchronous work; never held across an `.await`.
pub(crate) struct RoomState {
    pub registry: RoomRegistry,
    pub directory: ProducerDirectory,
}

/// Global SFU manager statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub active_rooms: usize,
    pub joined_endpoints: usize,
    pub connected_endpoints: usize,
    pub registered_producers: usize,
    pub transports: usize,
    pub producers: usize,
    pub consumers: usize,
}

/// One row of the room listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub member_count: usize,
    pub producer_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedProducer {
    pub producer_id: ProducerId,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub client_id: EndpointId,
    pub producers: Vec<PublishedProducer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub members: Vec<MemberSnapshot>,
}

pub struct SfuManager {
    config: Arc<SfuConfig>,
    engine: Arc<dyn MediaEngine>,
    rooms: Mutex<RoomState>,
    broadcaster: Broadcaster,
    transports: DashMap<TransportId, Arc<dyn MediaTransport>>,
    producers: DashMap<ProducerId, Arc<dyn MediaProducer>>,
    consumers: DashMap<ConsumerId, Arc<dyn MediaConsumer>>,
}

impl SfuManager {
    pub fn new(config: SfuConfig, engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        let registry = RoomRegistry::with_limits(config.max_peers_per_room, config.max_rooms);

        info!(
            max_peers_per_room = config.max_peers_per_room,
            max_rooms = config.max_rooms,
            close_media_on_disconnect = config.close_media_on_disconnect,
            "SFU Manager initialized"
        );

        Arc::new(Self {
            config: Arc::new(config),
            engine,
            rooms: Mutex::new(RoomState {
                registry,
                directory: ProducerDirectory::new(),
            }),
            broadcaster: Broadcaster::new(),
            transports: DashMap::new(),
            producers: DashMap::new(),
            consumers: DashMap::new(),
        })
    }

    /// Open a session for a new connection with a generated endpoint id
    pub fn connect(self: &Arc<Self>) -> (SignalingSession, NotificationReceiver) {
        self.connect_as(EndpointId::generate())
    }

    /// Open a session for a connection with a known endpoint id
    pub fn connect_as(self: &Arc<Self>, endpoint: EndpointId) -> (SignalingSession, NotificationReceiver) {
        let notifications = self.broadcaster.register(endpoint.clone());
        info!(client_id = %endpoint, "Endpoint connected");
        (SignalingSession::new(endpoint, Arc::clone(self)), notifications)
    }

    pub fn config(&self) -> &SfuConfig {
        &self.config
    }

    pub(crate) fn engine(&self) -> &dyn MediaEngine {
        self.engine.as_ref()
    }

    pub(crate) fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Run `f` with exclusive access to membership and ownership state
    pub(crate) fn with_rooms<R>(&self, f: impl FnOnce(&mut RoomState) -> R) -> R {
        f(&mut *self.rooms.lock())
    }

    pub(crate) fn transport(&self, id: &TransportId) -> Result<Arc<dyn MediaTransport>> {
        self.transports
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::not_found("transport", id))
    }

    pub(crate) fn producer(&self, id: &ProducerId) -> Result<Arc<dyn MediaProducer>> {
        self.producers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::not_found("producer", id))
    }

    pub(crate) fn consumer(&self, id: &ConsumerId) -> Option<Arc<dyn MediaConsumer>> {
        self.consumers.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn insert_transport(&self, transport: Arc<dyn MediaTransport>) {
        self.transports.insert(transport.id(), transport);
    }

    pub(crate) fn insert_producer(&self, producer: Arc<dyn MediaProducer>) {
        self.producers.insert(producer.id(), producer);
    }

    pub(crate) fn remove_producer(&self, id: &ProducerId) -> Option<Arc<dyn MediaProducer>> {
        self.producers.remove(id).map(|(_, producer)| producer)
    }

    pub(crate) fn insert_consumer(&self, consumer: Arc<dyn MediaConsumer>) {
        self.consumers.insert(consumer.id(), consumer);
    }

    /// Close and forget the given media objects. Unknown ids are skipped.
    pub(crate) fn release_media(
        &self,
        transports: &[TransportId],
        producers: &[ProducerId],
        consumers: &[ConsumerId],
    ) {
        for id in consumers {
            if let Some((_, consumer)) = self.consumers.remove(id) {
                consumer.close();
            }
        }
        for id in producers {
            if let Some(producer) = self.remove_producer(id) {
                producer.close();
            }
        }
        for id in transports {
            if let Some((_, transport)) = self.transports.remove(id) {
                transport.close();
            }
        }
        debug!(
            transports = transports.len(),
            producers = producers.len(),
            consumers = consumers.len(),
            "Released media objects"
        );
    }

    /// Members of `room_id` in join order
    pub fn members_of(&self, room_id: &RoomId) -> Vec<EndpointId> {
        self.rooms.lock().registry.members_of(room_id)
    }

    pub fn room_of(&self, endpoint: &EndpointId) -> Option<RoomId> {
        self.rooms.lock().registry.room_of(endpoint).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().registry.room_count()
    }

    /// Summaries of every known room, ordered by room id
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.lock();
        rooms
            .registry
            .room_ids()
            .into_iter()
            .map(|room_id| {
                let producer_count = rooms
                    .registry
                    .members_of(&room_id)
                    .iter()
                    .map(|m| rooms.directory.producers_of(m).len())
                    .sum();
                RoomSummary {
                    member_count: rooms.registry.member_count(&room_id),
                    producer_count,
                    room_id,
                }
            })
            .collect()
    }

    pub fn room_snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        let rooms = self.rooms.lock();
        if !rooms.registry.contains_room(room_id) {
            return None;
        }
        let members = rooms
            .registry
            .members_of(room_id)
            .into_iter()
            .map(|client_id| MemberSnapshot {
                producers: rooms
                    .directory
                    .producers_of(&client_id)
                    .iter()
                    .map(|(producer_id, kind)| PublishedProducer {
                        producer_id: producer_id.clone(),
                        kind: *kind,
                    })
                    .collect(),
                client_id,
            })
            .collect();
        Some(RoomSnapshot {
            room_id: room_id.clone(),
            members,
        })
    }

    pub fn stats(&self) -> ManagerStats {
        let (active_rooms, joined_endpoints, registered_producers) = {
            let rooms = self.rooms.lock();
            (
                rooms.registry.room_count(),
                rooms.registry.endpoint_count(),
                rooms.directory.producer_count(),
            )
        };
        ManagerStats {
            active_rooms,
            joined_endpoints,
            connected_endpoints: self.broadcaster.channel_count(),
            registered_producers,
            transports: self.transports.len(),
            producers: self.producers.len(),
            consumers: self.consumers.len(),
        }
    }

    /// Cleanup empty rooms
    pub fn cleanup_empty_rooms(&self) -> usize {
        let (removed_count, remaining_rooms) = {
            let mut rooms = self.rooms.lock();
            let removed = rooms.registry.prune_empty();
            (removed, rooms.registry.room_count())
        };

        if removed_count > 0 {
            info!(removed_count, remaining_rooms, "Cleaned up empty rooms");
        }
        removed_count
    }

    /// Start the empty-room cleanup task, if an interval is configured
    pub fn spawn_maintenance(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let secs = self.config.empty_room_cleanup_secs;
        if secs == 0 {
            info!("Empty room cleanup disabled");
            return None;
        }
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            manager.cleanup_task(Duration::from_secs(secs)).await;
        }))
    }

    async fn cleanup_task(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);
        info!(interval_secs = period.as_secs(), "Starting cleanup task");

        loop {
            ticker.tick().await;
            self.cleanup_empty_rooms();
        }
    }

    /// Close every media object still registered
    pub fn shutdown(&self) {
        let stats = self.stats();
        if stats.transports + stats.producers + stats.consumers > 0 {
            warn!(
                transports = stats.transports,
                producers = stats.producers,
                consumers = stats.consumers,
                "Closing media objects still registered at shutdown"
            );
        }
        for entry in self.consumers.iter() {
            entry.value().close();
        }
        for entry in self.producers.iter() {
            entry.value().close();
        }
        for entry in self.transports.iter() {
            entry.value().close();
        }
        self.consumers.clear();
        self.producers.clear();
        self.transports.clear();
        info!("SFU manager shut down");
    }
}
