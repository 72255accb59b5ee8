//! Conclave SFU signaling and room coordination
//!
//! This crate implements the control plane of a Selective Forwarding Unit.
//! Media is moved by a pluggable engine. This crate tracks room membership
//! and producer ownership, and tells room members about changes.
//!
//! ## Architecture
//!
//! - **`RoomRegistry`**: Room membership and the reverse endpoint mapping
//! - **`ProducerDirectory`**: Which endpoint owns which producer
//! - **`Broadcaster`**: Per-endpoint notification channels
//! - **`SfuManager`**: Process-wide owner of the above plus engine objects
//! - **`SignalingSession`**: One connection's request state machine
//! - **`MediaEngine`**: The engine seam, with an in-process `LoopbackEngine`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conclave_sfu::{LoopbackEngine, RoomId, SfuConfig, SfuManager};
//!
//! let manager = SfuManager::new(SfuConfig::default(), Arc::new(LoopbackEngine::default()));
//! let (mut session, mut notifications) = manager.connect();
//! let joined = session.join(RoomId::parse("lobby")?)?;
//! let transport = session.create_transport().await?;
//! ```

mod broadcaster;
mod config;
mod directory;
pub mod engine;
mod error;
mod events;
mod manager;
mod registry;
mod session;
mod types;

pub use broadcaster::{Broadcaster, NotificationReceiver, NotificationSender};
pub use config::SfuConfig;
pub use directory::{DirectoryError, ProducerDirectory};
pub use engine::{
    EngineError, LoopbackEngine, LoopbackOptions, MediaConsumer, MediaEngine, MediaProducer,
    MediaTransport, TransportOptions,
};
pub use error::{Error, Result};
pub use events::{Notification, PeerEvent, ProducerInfo};
pub use manager::{
    ManagerStats, MemberSnapshot, PublishedProducer, RoomSnapshot, RoomSummary, SfuManager,
};
pub use registry::RoomRegistry;
pub use session::{Connected, Consumed, Joined, Produced, Resumed, SessionState, SignalingSession};
pub use types::{ConsumerId, EndpointId, MediaKind, ProducerId, RoomId, TransportId, MAX_ROOM_ID_LEN};
