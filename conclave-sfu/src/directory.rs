//! Producer ownership directory
//!
//! Maps each endpoint to the producers it published, in creation order, and
//! keeps an exact producer -> owner index for the self-consumption guard.

use std::collections::HashMap;
use thiserror::Error;

use crate::types::{EndpointId, MediaKind, ProducerId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Producer already registered: {0}")]
    AlreadyRegistered(ProducerId),

    #[error("Producer not found: {0}")]
    NotFound(ProducerId),
}

#[derive(Debug, Default)]
pub struct ProducerDirectory {
    by_endpoint: HashMap<EndpointId, Vec<(ProducerId, MediaKind)>>,
    owners: HashMap<ProducerId, EndpointId>,
}

impl ProducerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        endpoint: &EndpointId,
        producer_id: &ProducerId,
        kind: MediaKind,
    ) -> Result<(), DirectoryError> {
        if self.owners.contains_key(producer_id) {
            return Err(DirectoryError::AlreadyRegistered(producer_id.clone()));
        }
        self.owners.insert(producer_id.clone(), endpoint.clone());
        self.by_endpoint
            .entry(endpoint.clone())
            .or_default()
            .push((producer_id.clone(), kind));
        Ok(())
    }

    pub fn owner_of(&self, producer_id: &ProducerId) -> Result<&EndpointId, DirectoryError> {
        self.owners
            .get(producer_id)
            .ok_or_else(|| DirectoryError::NotFound(producer_id.clone()))
    }

    /// Producers owned by `endpoint`, oldest first
    #[must_use]
    pub fn producers_of(&self, endpoint: &EndpointId) -> &[(ProducerId, MediaKind)] {
        self.by_endpoint.get(endpoint).map_or(&[], Vec::as_slice)
    }

    /// Forget every producer owned by `endpoint`; returns the removed ids.
    ///
    /// Media-plane producers are not closed here.
    pub fn unregister_all(&mut self, endpoint: &EndpointId) -> Vec<ProducerId> {
        let removed: Vec<ProducerId> = self
            .by_endpoint
            .remove(endpoint)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        for id in &removed {
            self.owners.remove(id);
        }
        removed
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.owners.len()
    }
}
