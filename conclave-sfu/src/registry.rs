//! Room membership registry
//!
//! Owns room id -> member set and the reverse endpoint id -> room mapping.
//! Pure in-memory state; callers serialize access (see `SfuManager`).

use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{EndpointId, RoomId};

#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Members in join order
    rooms: HashMap<RoomId, IndexSet<EndpointId>>,
    memberships: HashMap<EndpointId, RoomId>,
    /// 0 = unlimited
    max_members: usize,
    /// 0 = unlimited
    max_rooms: usize,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(max_members: usize, max_rooms: usize) -> Self {
        Self {
            max_members,
            max_rooms,
            ..Self::default()
        }
    }

    /// Move `endpoint` into `room_id`, leaving its previous room first.
    ///
    /// Limits are checked before anything is mutated, so a rejected join
    /// leaves the endpoint where it was. Returns the room's members.
    pub fn join(&mut self, endpoint: &EndpointId, room_id: &RoomId) -> Result<Vec<EndpointId>> {
        self.check_limits(endpoint, room_id)?;

        if let Some(previous) = self.memberships.get(endpoint).cloned() {
            if let Some(members) = self.rooms.get_mut(&previous) {
                members.shift_remove(endpoint);
            }
            debug!(client_id = %endpoint, room_id = %previous, "Left previous room");
        }

        let members = self.rooms.entry(room_id.clone()).or_default();
        members.insert(endpoint.clone());
        self.memberships.insert(endpoint.clone(), room_id.clone());

        Ok(members.iter().cloned().collect())
    }

    fn check_limits(&self, endpoint: &EndpointId, room_id: &RoomId) -> Result<()> {
        match self.rooms.get(room_id) {
            Some(members) => {
                if self.max_members > 0
                    && !members.contains(endpoint)
                    && members.len() >= self.max_members
                {
                    return Err(Error::RoomFull {
                        room_id: room_id.clone(),
                        limit: self.max_members,
                    });
                }
            }
            None => {
                if self.max_rooms > 0 && self.rooms.len() >= self.max_rooms {
                    return Err(Error::RoomLimitReached(self.max_rooms));
                }
            }
        }
        Ok(())
    }

    /// Remove `endpoint` from its room. Returns the vacated room, if any.
    pub fn leave(&mut self, endpoint: &EndpointId) -> Option<RoomId> {
        let room_id = self.memberships.remove(endpoint)?;
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.shift_remove(endpoint);
        }
        Some(room_id)
    }

    /// Members of `room_id` in join order; empty for unknown rooms
    #[must_use]
    pub fn members_of(&self, room_id: &RoomId) -> Vec<EndpointId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, IndexSet::len)
    }

    #[must_use]
    pub fn room_of(&self, endpoint: &EndpointId) -> Option<&RoomId> {
        self.memberships.get(endpoint)
    }

    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Total number of endpoints currently in a room
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.memberships.len()
    }

    /// Drop entries for rooms without members. Returns how many were removed.
    pub fn prune_empty(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, members| !members.is_empty());
        before - self.rooms.len()
    }
}
