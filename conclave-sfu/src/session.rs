//! Per-connection signaling state machine
//!
//! A session moves `Unjoined -> Joined(room)`, may hop directly between
//! rooms, and ends in `Disconnected`. Every mutation of room membership or
//! producer ownership happens inside one `SfuManager::with_rooms` critical
//! section that contains no `.await`; engine calls run outside it and
//! notifications are sent only after the mutation is visible.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::TransportOptions;
use crate::error::{Error, Result};
use crate::events::{Notification, ProducerInfo};
use crate::manager::SfuManager;
use crate::types::{ConsumerId, EndpointId, MediaKind, ProducerId, RoomId, TransportId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(RoomId),
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Joined {
    pub joined: bool,
    pub existing_producers: Vec<ProducerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connected {
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Produced {
    pub id: ProducerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumed {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resumed {
    pub resumed: bool,
}

/// Media objects this session created, in creation order
#[derive(Debug, Default)]
struct OwnedMedia {
    transports: Vec<TransportId>,
    producers: Vec<ProducerId>,
    consumers: Vec<ConsumerId>,
}

impl OwnedMedia {
    fn is_empty(&self) -> bool {
        self.transports.is_empty() && self.producers.is_empty() && self.consumers.is_empty()
    }
}

/// Membership changes computed inside a join critical section
struct JoinOutcome {
    /// Previous room and the members still in it
    left: Option<(RoomId, Vec<EndpointId>)>,
    members: Vec<EndpointId>,
    existing: Vec<ProducerInfo>,
}

pub struct SignalingSession {
    endpoint: EndpointId,
    manager: Arc<SfuManager>,
    state: SessionState,
    owned: OwnedMedia,
}

impl SignalingSession {
    pub(crate) fn new(endpoint: EndpointId, manager: Arc<SfuManager>) -> Self {
        Self {
            endpoint,
            manager,
            state: SessionState::Unjoined,
            owned: OwnedMedia::default(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &EndpointId {
        &self.endpoint
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Err(Error::InvalidOperation("session is disconnected".to_string()));
        }
        Ok(())
    }

    /// Leave the current room (if any) and join `room_id`.
    ///
    /// Returns the producers already published by other members.
    pub fn join(&mut self, room_id: RoomId) -> Result<Joined> {
        self.ensure_active()?;
        let endpoint = &self.endpoint;

        let outcome = self.manager.with_rooms(|rooms| -> Result<JoinOutcome> {
            let previous = rooms.registry.room_of(endpoint).cloned();
            let members = rooms.registry.join(endpoint, &room_id)?;

            let left = previous.map(|prev| {
                let remaining = rooms.registry.members_of(&prev);
                (prev, remaining)
            });
            let existing = members
                .iter()
                .filter(|member| *member != endpoint)
                .flat_map(|member| {
                    rooms
                        .directory
                        .producers_of(member)
                        .iter()
                        .map(move |(producer_id, kind)| ProducerInfo {
                            producer_id: producer_id.clone(),
                            client_id: member.clone(),
                            kind: *kind,
                        })
                })
                .collect();

            Ok(JoinOutcome {
                left,
                members,
                existing,
            })
        })?;

        let broadcaster = self.manager.broadcaster();
        if let Some((previous, remaining)) = &outcome.left {
            broadcaster.broadcast(remaining, endpoint, &Notification::user_left(endpoint.clone()));
            debug!(client_id = %endpoint, room_id = %previous, "Endpoint left room");
        }
        broadcaster.broadcast(
            &outcome.members,
            endpoint,
            &Notification::user_joined(endpoint.clone()),
        );

        info!(
            client_id = %endpoint,
            room_id = %room_id,
            member_count = outcome.members.len(),
            existing_producers = outcome.existing.len(),
            "Endpoint joined room"
        );
        self.state = SessionState::Joined(room_id);

        Ok(Joined {
            joined: true,
            existing_producers: outcome.existing,
        })
    }

    pub async fn rtp_capabilities(&self) -> Result<Value> {
        self.ensure_active()?;
        Ok(self.manager.engine().rtp_capabilities().await?)
    }

    pub async fn create_transport(&mut self) -> Result<TransportOptions> {
        self.ensure_active()?;
        let transport = self.manager.engine().create_transport(&self.endpoint).await?;
        let options = transport.options();

        self.owned.transports.push(options.id.clone());
        self.manager.insert_transport(transport);
        debug!(client_id = %self.endpoint, transport_id = %options.id, "Transport created");

        Ok(options)
    }

    pub async fn connect_transport(
        &mut self,
        transport_id: &TransportId,
        dtls_parameters: Value,
    ) -> Result<Connected> {
        self.ensure_active()?;
        let transport = self.manager.transport(transport_id)?;
        transport.connect(dtls_parameters).await?;
        debug!(client_id = %self.endpoint, transport_id = %transport_id, "Transport connected");

        Ok(Connected { connected: true })
    }

    /// Publish a stream and announce it to the caller's room, if any
    pub async fn produce(
        &mut self,
        transport_id: &TransportId,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<Produced> {
        self.ensure_active()?;
        let transport = self.manager.transport(transport_id)?;
        let producer = transport.produce(kind, rtp_parameters).await?;
        let producer_id = producer.id();
        let kind = producer.kind();
        let endpoint = &self.endpoint;

        // Table entry, directory entry and audience snapshot change together
        let registered = self.manager.with_rooms(|rooms| -> Result<_> {
            rooms.directory.register(endpoint, &producer_id, kind)?;
            self.manager.insert_producer(Arc::clone(&producer));
            Ok(rooms
                .registry
                .room_of(endpoint)
                .map(|room_id| (room_id.clone(), rooms.registry.members_of(room_id))))
        });
        let audience = match registered {
            Ok(audience) => audience,
            Err(err) => {
                producer.close();
                return Err(err);
            }
        };

        self.owned.producers.push(producer_id.clone());

        match audience {
            Some((room_id, members)) => {
                let notification = Notification::NewProducer(ProducerInfo {
                    producer_id: producer_id.clone(),
                    client_id: endpoint.clone(),
                    kind,
                });
                let sent = self.manager.broadcaster().broadcast(&members, endpoint, &notification);
                info!(
                    client_id = %endpoint,
                    room_id = %room_id,
                    producer_id = %producer_id,
                    kind = %kind,
                    notified = sent,
                    "Producer created"
                );
            }
            None => {
                debug!(
                    client_id = %endpoint,
                    producer_id = %producer_id,
                    "Producer created outside a room, no peers notified"
                );
            }
        }

        Ok(Produced { id: producer_id })
    }

    /// Subscribe to another endpoint's producer. The consumer starts paused.
    pub async fn consume(
        &mut self,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<Consumed> {
        self.ensure_active()?;
        let transport = self.manager.transport(transport_id)?;
        self.manager.producer(producer_id)?;

        let own = self.manager.with_rooms(|rooms| {
            rooms
                .directory
                .owner_of(producer_id)
                .is_ok_and(|owner| *owner == self.endpoint)
        });
        if own {
            warn!(
                client_id = %self.endpoint,
                producer_id = %producer_id,
                "Rejected attempt to consume own producer"
            );
            return Err(Error::InvalidOperation("cannot consume own producer".to_string()));
        }

        let consumer = transport.consume(producer_id, rtp_capabilities, true).await?;
        let consumed = Consumed {
            id: consumer.id(),
            producer_id: consumer.producer_id(),
            kind: consumer.kind(),
            rtp_parameters: consumer.rtp_parameters(),
        };

        self.owned.consumers.push(consumed.id.clone());
        self.manager.insert_consumer(consumer);
        debug!(
            client_id = %self.endpoint,
            consumer_id = %consumed.id,
            producer_id = %producer_id,
            "Consumer created paused"
        );

        Ok(consumed)
    }

    /// Resume a paused consumer. An unknown id is logged, not an error.
    pub async fn resume_consumer(&mut self, consumer_id: &ConsumerId) -> Result<Resumed> {
        self.ensure_active()?;
        let Some(consumer) = self.manager.consumer(consumer_id) else {
            warn!(
                client_id = %self.endpoint,
                consumer_id = %consumer_id,
                "Resume requested for unknown consumer"
            );
            return Ok(Resumed { resumed: false });
        };

        consumer.resume().await?;
        debug!(client_id = %self.endpoint, consumer_id = %consumer_id, "Consumer resumed");
        Ok(Resumed { resumed: true })
    }

    /// Tear down room and directory bookkeeping for this endpoint.
    ///
    /// Idempotent. Also runs on drop.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        let endpoint = &self.endpoint;

        let (vacated, unregistered) = self.manager.with_rooms(|rooms| {
            let vacated = rooms.registry.leave(endpoint).map(|room_id| {
                let remaining = rooms.registry.members_of(&room_id);
                (room_id, remaining)
            });
            (vacated, rooms.directory.unregister_all(endpoint))
        });

        let broadcaster = self.manager.broadcaster();
        broadcaster.unregister(endpoint);
        if let Some((room_id, remaining)) = &vacated {
            broadcaster.broadcast(remaining, endpoint, &Notification::user_left(endpoint.clone()));
            debug!(client_id = %endpoint, room_id = %room_id, "Endpoint left room on disconnect");
        }

        let owned = std::mem::take(&mut self.owned);
        if self.manager.config().close_media_on_disconnect {
            self.manager
                .release_media(&owned.transports, &owned.producers, &owned.consumers);
        } else if !owned.is_empty() {
            // Media objects stay in the lookup tables; see close_media_on_disconnect
            warn!(
                client_id = %endpoint,
                transports = owned.transports.len(),
                producers = owned.producers.len(),
                consumers = owned.consumers.len(),
                "Media objects left registered after disconnect"
            );
        }

        info!(
            client_id = %endpoint,
            room_id = vacated.as_ref().map(|(room_id, _)| room_id.as_str()),
            unregistered_producers = unregistered.len(),
            "Endpoint disconnected"
        );
        self.state = SessionState::Disconnected;
    }
}

impl Drop for SignalingSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::NotificationReceiver;
    use crate::config::SfuConfig;
    use crate::engine::{EngineError, LoopbackEngine, MediaEngine, MockMediaEngine};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn manager() -> Arc<SfuManager> {
        SfuManager::new(SfuConfig::default(), Arc::new(LoopbackEngine::default()))
    }

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    fn peer(manager: &Arc<SfuManager>, id: &str) -> (SignalingSession, NotificationReceiver) {
        manager.connect_as(EndpointId::from(id))
    }

    async fn next(rx: &mut NotificationReceiver) -> Notification {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("notification expected")
            .expect("channel open")
    }

    async fn assert_silent(rx: &mut NotificationReceiver) {
        let received = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(received.is_err(), "unexpected notification: {received:?}");
    }

    async fn publish(session: &mut SignalingSession, kind: MediaKind) -> ProducerId {
        let transport = session.create_transport().await.unwrap();
        session.produce(&transport.id, kind, json!({})).await.unwrap().id
    }

    #[tokio::test]
    async fn test_room_scenario() {
        let manager = manager();
        let (mut a, mut rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        let (mut c, mut rx_c) = peer(&manager, "c");

        let joined = a.join(room("r1")).unwrap();
        assert!(joined.joined);
        assert!(joined.existing_producers.is_empty());

        b.join(room("r1")).unwrap();
        assert_eq!(next(&mut rx_a).await, Notification::user_joined(EndpointId::from("b")));

        let producer_id = publish(&mut a, MediaKind::Audio).await;
        assert_eq!(
            next(&mut rx_b).await,
            Notification::NewProducer(ProducerInfo {
                producer_id: producer_id.clone(),
                client_id: EndpointId::from("a"),
                kind: MediaKind::Audio,
            })
        );
        assert_silent(&mut rx_a).await;

        let joined = c.join(room("r1")).unwrap();
        assert_eq!(
            joined.existing_producers,
            vec![ProducerInfo {
                producer_id,
                client_id: EndpointId::from("a"),
                kind: MediaKind::Audio,
            }]
        );
        assert_eq!(next(&mut rx_a).await, Notification::user_joined(EndpointId::from("c")));
        assert_eq!(next(&mut rx_b).await, Notification::user_joined(EndpointId::from("c")));
        assert_silent(&mut rx_c).await;
    }

    #[tokio::test]
    async fn test_consume_own_producer_rejected() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        a.join(room("r1")).unwrap();

        let transport = a.create_transport().await.unwrap();
        let producer = a.produce(&transport.id, MediaKind::Video, json!({})).await.unwrap();

        let result = a.consume(&transport.id, &producer.id, json!({})).await;
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert_eq!(manager.stats().consumers, 0);
    }

    #[tokio::test]
    async fn test_consume_on_unknown_transport() {
        let engine = MockMediaEngine::new();
        let manager = SfuManager::new(SfuConfig::default(), Arc::new(engine));
        let (mut a, _rx) = peer(&manager, "a");

        let result = a
            .consume(&TransportId::from("t"), &ProducerId::from("p"), json!({}))
            .await;
        assert!(matches!(result, Err(Error::NotFound { kind: "transport", .. })));
    }

    #[tokio::test]
    async fn test_consume_peer_producer_and_resume() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, _rx_b) = peer(&manager, "b");
        a.join(room("r1")).unwrap();
        b.join(room("r1")).unwrap();

        let producer_id = publish(&mut a, MediaKind::Audio).await;
        let recv_transport = b.create_transport().await.unwrap();
        b.connect_transport(&recv_transport.id, json!({"role": "client"}))
            .await
            .unwrap();

        let consumed = b
            .consume(&recv_transport.id, &producer_id, json!({"codecs": []}))
            .await
            .unwrap();
        assert_eq!(consumed.producer_id, producer_id);
        assert_eq!(consumed.kind, MediaKind::Audio);
        assert!(manager.consumer(&consumed.id).unwrap().paused());

        let resumed = b.resume_consumer(&consumed.id).await.unwrap();
        assert!(resumed.resumed);
        assert!(!manager.consumer(&consumed.id).unwrap().paused());

        let missing = b.resume_consumer(&ConsumerId::from("nope")).await.unwrap();
        assert!(!missing.resumed);
    }

    #[tokio::test]
    async fn test_lookup_misses_are_not_found() {
        let manager = manager();
        let (mut a, _rx) = peer(&manager, "a");
        let unknown = TransportId::from("missing");

        let result = a.connect_transport(&unknown, json!({})).await;
        assert!(matches!(result, Err(Error::NotFound { kind: "transport", .. })));

        let result = a.produce(&unknown, MediaKind::Audio, json!({})).await;
        assert!(matches!(result, Err(Error::NotFound { kind: "transport", .. })));

        let transport = a.create_transport().await.unwrap();
        let result = a
            .consume(&transport.id, &ProducerId::from("missing"), json!({}))
            .await;
        assert!(matches!(result, Err(Error::NotFound { kind: "producer", .. })));

        // The session is still usable afterwards
        assert!(a.join(room("r1")).is_ok());
    }

    #[tokio::test]
    async fn test_switch_rooms_notifies_both_rooms() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        let (mut c, mut rx_c) = peer(&manager, "c");

        b.join(room("r1")).unwrap();
        c.join(room("r2")).unwrap();
        a.join(room("r1")).unwrap();
        assert_eq!(next(&mut rx_b).await, Notification::user_joined(EndpointId::from("a")));

        a.join(room("r2")).unwrap();
        assert_eq!(next(&mut rx_b).await, Notification::user_left(EndpointId::from("a")));
        assert_eq!(next(&mut rx_c).await, Notification::user_joined(EndpointId::from("a")));
        assert_silent(&mut rx_b).await;

        assert_eq!(manager.members_of(&room("r1")), vec![EndpointId::from("b")]);
        assert_eq!(a.state(), &SessionState::Joined(room("r2")));
    }

    #[tokio::test]
    async fn test_rejoin_same_room_renotifies() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");

        b.join(room("r1")).unwrap();
        a.join(room("r1")).unwrap();
        assert_eq!(next(&mut rx_b).await, Notification::user_joined(EndpointId::from("a")));

        a.join(room("r1")).unwrap();
        assert_eq!(next(&mut rx_b).await, Notification::user_left(EndpointId::from("a")));
        assert_eq!(next(&mut rx_b).await, Notification::user_joined(EndpointId::from("a")));
    }

    #[tokio::test]
    async fn test_existing_producers_exclude_own() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, _rx_b) = peer(&manager, "b");

        a.join(room("r1")).unwrap();
        b.join(room("r1")).unwrap();
        publish(&mut a, MediaKind::Audio).await;
        let b_video = publish(&mut b, MediaKind::Video).await;

        let joined = a.join(room("r1")).unwrap();
        assert_eq!(joined.existing_producers.len(), 1);
        assert_eq!(joined.existing_producers[0].producer_id, b_video);
        assert!(joined
            .existing_producers
            .iter()
            .all(|p| p.client_id != EndpointId::from("a")));
    }

    #[tokio::test]
    async fn test_produce_outside_room_is_silent() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        b.join(room("r1")).unwrap();

        let transport = a.create_transport().await.unwrap();
        a.produce(&transport.id, MediaKind::Audio, json!({})).await.unwrap();
        assert_silent(&mut rx_b).await;
        assert_eq!(a.state(), &SessionState::Unjoined);
    }

    #[tokio::test]
    async fn test_failed_produce_has_no_side_effects() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        a.join(room("r1")).unwrap();
        b.join(room("r1")).unwrap();

        let transport = a.create_transport().await.unwrap();
        // The loopback engine rejects non-object parameters
        let result = a.produce(&transport.id, MediaKind::Audio, json!("garbage")).await;
        assert!(matches!(result, Err(Error::UpstreamFailure(_))));

        assert_silent(&mut rx_b).await;
        assert_eq!(manager.stats().registered_producers, 0);
        assert!(b.join(room("r1")).unwrap().existing_producers.is_empty());
    }

    #[tokio::test]
    async fn test_engine_failures_are_upstream() {
        let mut engine = MockMediaEngine::new();
        engine
            .expect_rtp_capabilities()
            .returning(|| Ok(json!({"codecs": [{"mimeType": "audio/opus"}]})));
        engine
            .expect_create_transport()
            .returning(|_| Err(EngineError::new("worker died")));
        let manager = SfuManager::new(SfuConfig::default(), Arc::new(engine));
        let (mut a, _rx) = peer(&manager, "a");

        let caps = a.rtp_capabilities().await.unwrap();
        assert_eq!(caps["codecs"][0]["mimeType"], "audio/opus");

        let result = a.create_transport().await;
        assert!(matches!(result, Err(Error::UpstreamFailure(_))));
        assert_eq!(manager.stats().transports, 0);
    }

    #[tokio::test]
    async fn test_disconnect_cleans_bookkeeping() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        let (mut d, _rx_d) = peer(&manager, "d");

        a.join(room("r1")).unwrap();
        b.join(room("r1")).unwrap();
        publish(&mut a, MediaKind::Audio).await;
        next(&mut rx_b).await;

        a.disconnect();
        assert_eq!(next(&mut rx_b).await, Notification::user_left(EndpointId::from("a")));
        assert_eq!(manager.members_of(&room("r1")), vec![EndpointId::from("b")]);
        assert_eq!(manager.room_of(&EndpointId::from("a")), None);

        let joined = d.join(room("r1")).unwrap();
        assert!(joined.existing_producers.is_empty());

        // Media objects are left registered by default
        let stats = manager.stats();
        assert_eq!(stats.producers, 1);
        assert_eq!(stats.transports, 1);
        assert_eq!(stats.registered_producers, 0);
    }

    #[tokio::test]
    async fn test_disconnect_releases_media_when_enabled() {
        let engine = Arc::new(LoopbackEngine::default());
        let config = SfuConfig {
            close_media_on_disconnect: true,
            ..SfuConfig::default()
        };
        let manager = SfuManager::new(config, Arc::clone(&engine) as Arc<dyn MediaEngine>);
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, _rx_b) = peer(&manager, "b");
        a.join(room("r1")).unwrap();
        b.join(room("r1")).unwrap();

        let producer_id = publish(&mut a, MediaKind::Video).await;
        let transport = b.create_transport().await.unwrap();
        b.consume(&transport.id, &producer_id, json!({})).await.unwrap();
        assert_eq!(engine.live_producers(), 1);

        a.disconnect();
        assert_eq!(engine.live_producers(), 0);
        let stats = manager.stats();
        assert_eq!(stats.producers, 0);
        assert_eq!(stats.transports, 1);
        assert_eq!(stats.consumers, 1);

        b.disconnect();
        assert_eq!(manager.stats().transports, 0);
        assert_eq!(manager.stats().consumers, 0);
    }

    #[tokio::test]
    async fn test_disconnected_session_rejects_requests() {
        let manager = manager();
        let (mut a, _rx) = peer(&manager, "a");
        a.disconnect();
        a.disconnect();

        assert_eq!(a.state(), &SessionState::Disconnected);
        assert!(matches!(a.join(room("r1")), Err(Error::InvalidOperation(_))));
        assert!(a.create_transport().await.is_err());
        assert_eq!(manager.stats().connected_endpoints, 0);
    }

    #[tokio::test]
    async fn test_drop_disconnects() {
        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        b.join(room("r1")).unwrap();
        a.join(room("r1")).unwrap();
        next(&mut rx_b).await;

        drop(a);
        assert_eq!(next(&mut rx_b).await, Notification::user_left(EndpointId::from("a")));
        assert_eq!(manager.members_of(&room("r1")), vec![EndpointId::from("b")]);
    }

    #[tokio::test]
    async fn test_full_room_keeps_previous_membership() {
        let config = SfuConfig {
            max_peers_per_room: 1,
            ..SfuConfig::default()
        };
        let manager = SfuManager::new(config, Arc::new(LoopbackEngine::default()));
        let (mut a, mut rx_a) = peer(&manager, "a");
        let (mut b, _rx_b) = peer(&manager, "b");

        a.join(room("r1")).unwrap();
        b.join(room("lobby")).unwrap();

        let result = b.join(room("r1"));
        assert!(matches!(result, Err(Error::RoomFull { .. })));
        assert_eq!(b.state(), &SessionState::Joined(room("lobby")));
        assert_eq!(manager.room_of(&EndpointId::from("b")), Some(room("lobby")));
        assert_silent(&mut rx_a).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_produce_and_join_reports_each_producer_once() {
        const PRODUCERS: usize = 50;

        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, mut rx_b) = peer(&manager, "b");
        a.join(room("r1")).unwrap();

        let producing = tokio::spawn(async move {
            let mut ids = Vec::with_capacity(PRODUCERS);
            for _ in 0..PRODUCERS {
                ids.push(publish(&mut a, MediaKind::Audio).await);
                tokio::task::yield_now().await;
            }
            (a, ids)
        });
        let joining = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let joined = b.join(room("r1")).unwrap();
            (b, joined)
        });

        let (a, produced) = producing.await.unwrap();
        let (b, joined) = joining.await.unwrap();

        let mut seen: Vec<ProducerId> = joined
            .existing_producers
            .into_iter()
            .map(|p| p.producer_id)
            .collect();
        while let Ok(notification) = rx_b.try_recv() {
            if let Notification::NewProducer(info) = notification {
                seen.push(info.producer_id);
            }
        }

        let unique: HashSet<_> = seen.iter().cloned().collect();
        assert_eq!(seen.len(), PRODUCERS, "each producer reported exactly once");
        assert_eq!(unique, produced.into_iter().collect::<HashSet<_>>());
        drop((a, b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_existing_producers_resolve_while_publishing() {
        const PRODUCERS: usize = 300;

        let manager = manager();
        let (mut a, _rx_a) = peer(&manager, "a");
        let (mut b, _rx_b) = peer(&manager, "b");
        a.join(room("r1")).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let joiner = {
            let manager = Arc::clone(&manager);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let (mut joins, mut unresolved) = (0usize, 0usize);
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let joined = b.join(room("r1")).unwrap();
                    joins += 1;
                    unresolved += joined
                        .existing_producers
                        .iter()
                        .filter(|p| manager.producer(&p.producer_id).is_err())
                        .count();
                    if finished {
                        break;
                    }
                }
                (joins, unresolved)
            })
        };

        let transport = a.create_transport().await.unwrap();
        for _ in 0..PRODUCERS {
            a.produce(&transport.id, MediaKind::Audio, json!({}))
                .await
                .unwrap();
        }
        done.store(true, Ordering::Release);

        let (joins, unresolved) = joiner.join().unwrap();
        assert!(joins > 0);
        assert_eq!(unresolved, 0, "{unresolved} listed producers missing from the table");
    }
}
