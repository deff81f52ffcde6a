//! The resource store: canonical records, filtered reads, point updates.

use crate::bus::NotificationBus;
use crate::error::{Result, SyncError};
use crate::query::QueryFilter;
use crate::types::{Resource, ResourceId, ResourcePatch};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records in insertion order plus an id -> position index.
struct Records {
    items: Vec<Resource>,
    positions: HashMap<ResourceId, usize>,
}

impl Records {
    fn from_seed(seed: Vec<Resource>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(seed.len());
        for (pos, resource) in seed.iter().enumerate() {
            if positions.insert(resource.id.clone(), pos).is_some() {
                return Err(SyncError::DuplicateId(resource.id.clone()));
            }
        }
        Ok(Self {
            items: seed,
            positions,
        })
    }

    /// Position of `id`, checked against the record vector.
    fn locate(&self, id: &ResourceId) -> Result<Option<usize>> {
        let Some(&pos) = self.positions.get(id) else {
            return Ok(None);
        };
        match self.items.get(pos) {
            Some(resource) if resource.id == *id => Ok(Some(pos)),
            Some(resource) => Err(SyncError::Corruption(format!(
                "index maps {} to position {} holding {}",
                id, pos, resource.id
            ))),
            None => Err(SyncError::Corruption(format!(
                "index maps {} past end of store (len={})",
                id,
                self.items.len()
            ))),
        }
    }
}

/// Owns the canonical set of resources.
///
/// All writes go through [`update`](Self::update), which merges, swaps the
/// record in as one unit and publishes the result on the bus.
pub struct ResourceStore {
    records: RwLock<Records>,

    /// Serializes read-modify-publish so per-subscriber delivery order
    /// matches apply order.
    write_lock: Mutex<()>,

    bus: Arc<NotificationBus>,

    updates_applied: AtomicU64,
}

impl ResourceStore {
    /// Create a store seeded with `seed`, in that order.
    pub fn new(seed: Vec<Resource>, bus: Arc<NotificationBus>) -> Result<Self> {
        let records = Records::from_seed(seed)?;
        debug!(count = records.items.len(), "Seeded resource store");

        Ok(Self {
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
            bus,
            updates_applied: AtomicU64::new(0),
        })
    }

    /// Create a store from a JSON array of resources.
    pub fn from_json(json: &str, bus: Arc<NotificationBus>) -> Result<Self> {
        let seed: Vec<Resource> = serde_json::from_str(json)?;
        Self::new(seed, bus)
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    // --- Reads ---

    /// All resources matching `filter`, in insertion order.
    pub fn query(&self, filter: &QueryFilter) -> Vec<Resource> {
        let predicate = filter.predicate();
        let records = self.records.read();

        let matched: Vec<Resource> = if predicate.is_trivial() {
            records.items.clone()
        } else {
            records
                .items
                .iter()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect()
        };
        drop(records);

        debug!(?filter, matched = matched.len(), "Query");
        matched
    }

    /// Get a resource by id.
    pub fn get(&self, id: &ResourceId) -> Option<Resource> {
        let records = self.records.read();
        records
            .positions
            .get(id)
            .and_then(|&pos| records.items.get(pos))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful updates since construction.
    pub fn updates_applied(&self) -> u64 {
        self.updates_applied.load(Ordering::Relaxed)
    }

    // --- Writes ---

    /// Apply `patch` to the resource `id` and publish the merged result.
    ///
    /// Unsupplied fields keep their values. On error nothing changes and
    /// nothing is published.
    pub fn update(&self, id: &ResourceId, patch: ResourcePatch) -> Result<Resource> {
        if patch.is_empty() {
            return Err(SyncError::EmptyPatch);
        }

        let _lock = self.write_lock.lock();

        let updated = {
            let mut records = self.records.write();
            let pos = match records.locate(id)? {
                Some(pos) => pos,
                None => {
                    warn!(resource = %id, "Update for unknown resource");
                    return Err(SyncError::NotFound(id.clone()));
                }
            };

            let updated = records.items[pos].merged(&patch);
            records.items[pos] = updated.clone();
            updated
        };

        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        info!(resource = %id, ?patch, "Updated");

        // Still under write_lock: subscribers see updates in apply order.
        self.bus.publish(&updated);

        Ok(updated)
    }
}
