//! SFU Configuration

use serde::{Deserialize, Serialize};

/// SFU configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SfuConfig {
    /// Maximum members per room (0 = unlimited)
    pub max_peers_per_room: usize,
    /// Maximum number of concurrent rooms (0 = unlimited)
    pub max_rooms: usize,
    /// Close and forget an endpoint's transports, producers and consumers
    /// when its connection drops. Off by default: only the room and
    /// producer-directory bookkeeping is cleaned up.
    pub close_media_on_disconnect: bool,
    /// Interval of the empty-room cleanup task in seconds (0 = disabled)
    pub empty_room_cleanup_secs: u64,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            max_peers_per_room: 0,
            max_rooms: 0,
            close_media_on_disconnect: false,
            empty_room_cleanup_secs: 60,
        }
    }
}
