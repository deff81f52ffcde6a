//! Service object tying store, bus and registry together.

use crate::bus::NotificationBus;
use crate::error::{Result, SyncError};
use crate::query::QueryFilter;
use crate::seed;
use crate::store::ResourceStore;
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionRegistry, DEFAULT_BUFFER_SIZE,
};
use crate::types::{Resource, ResourceId, ResourcePatch, SyncStats};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Where the initial collection comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// The built-in cloud resource collection.
    #[default]
    Default,
    /// Start empty.
    Empty,
    /// Resources supplied inline.
    Inline(Vec<Resource>),
}

impl SeedSource {
    fn resolve(self) -> Vec<Resource> {
        match self {
            SeedSource::Default => seed::cloud_resources(),
            SeedSource::Empty => Vec::new(),
            SeedSource::Inline(resources) => resources,
        }
    }
}

/// Service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-subscriber delivery queue depth.
    pub buffer_size: usize,

    /// Initial collection.
    pub seed: SeedSource,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            seed: SeedSource::Default,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON config; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SyncConfig =
            serde_json::from_str(json).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(SyncError::InvalidConfig(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The live-sync core as seen by transport layers: query, mutate,
/// subscribe.
///
/// Each instance is isolated; nothing is shared through globals.
pub struct SyncService {
    store: ResourceStore,
    registry: Arc<SubscriptionRegistry>,
    subscription_config: SubscriptionConfig,
    shut_down: AtomicBool,
}

impl SyncService {
    /// Build a service from config.
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let subscription_config = SubscriptionConfig {
            buffer_size: config.buffer_size,
        };
        let registry = Arc::new(SubscriptionRegistry::with_config(
            subscription_config.clone(),
        ));
        let bus = Arc::new(NotificationBus::new(Arc::clone(&registry)));
        let store = ResourceStore::new(config.seed.resolve(), bus)?;

        info!(
            resources = store.len(),
            buffer_size = subscription_config.buffer_size,
            "Sync service started"
        );

        Ok(Self {
            store,
            registry,
            subscription_config,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Build a service seeded with `resources`.
    pub fn with_resources(config: SyncConfig, resources: Vec<Resource>) -> Result<Self> {
        Self::new(SyncConfig {
            seed: SeedSource::Inline(resources),
            ..config
        })
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    // --- Boundary operations ---

    /// Read path.
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<Resource>> {
        Ok(self.store.query(filter))
    }

    /// Read path with raw request arguments.
    pub fn query_json(&self, args: &serde_json::Value) -> Result<Vec<Resource>> {
        let filter = QueryFilter::from_json(args)?;
        self.query(&filter)
    }

    /// Write path. Publishes the merged resource on success.
    pub fn mutate(&self, id: &str, patch: ResourcePatch) -> Result<Resource> {
        self.ensure_running()?;
        self.store.update(&ResourceId::from(id), patch)
    }

    /// Write path with raw request fields, e.g. `{"status": "inactive"}`.
    pub fn mutate_json(&self, id: &str, fields: &serde_json::Value) -> Result<Resource> {
        let patch: ResourcePatch = serde_json::from_value(fields.clone())
            .map_err(|e| SyncError::InvalidPatch(e.to_string()))?;
        self.mutate(id, patch)
    }

    /// Register a live subscriber.
    pub fn subscribe(&self) -> Result<SubscriptionHandle> {
        self.ensure_running()?;
        Ok(self.registry.subscribe(self.subscription_config.clone()))
    }

    /// Register a live subscriber with its own config.
    pub fn subscribe_with(&self, config: SubscriptionConfig) -> Result<SubscriptionHandle> {
        self.ensure_running()?;
        Ok(self.registry.subscribe(config))
    }

    /// Close every subscription and refuse further writes and subscribes.
    /// Reads keep working. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let closed = self.registry.close_all();
        info!(closed_subscriptions = closed, "Sync service shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            resource_count: self.store.len(),
            subscriber_count: self.registry.subscription_count(),
            updates_applied: self.store.updates_applied(),
            events_dropped: self.registry.events_dropped(),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(SyncError::ShutDown)
        } else {
            Ok(())
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
