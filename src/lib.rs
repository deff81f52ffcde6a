//! # Live Sync
//!
//! An in-memory resource store whose changes are pushed to live
//! subscribers.
//!
//! ## Core Concepts
//!
//! - **Resources**: records with an immutable id and mutable name, kind, status
//! - **Queries**: status equality plus case-insensitive name search
//! - **Mutations**: partial updates, applied atomically and published once
//! - **Subscriptions**: bounded per-subscriber queues; slow consumers drop
//!   events instead of stalling writers
//!
//! ## Example
//!
//! ```ignore
//! use livesync::{QueryFilter, ResourcePatch, Status, SyncConfig, SyncService};
//!
//! let service = SyncService::new(SyncConfig::default())?;
//! let updates = service.subscribe()?;
//!
//! service.mutate("1", ResourcePatch::status(Status::Inactive))?;
//! let changed = updates.recv()?;
//!
//! let inactive = service.query(&QueryFilter::all().with_status(Status::Inactive))?;
//! ```

pub mod bus;
pub mod error;
pub mod query;
pub mod seed;
pub mod service;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{NotificationBus, PublishReport};
pub use error::{Result, SyncError};
pub use query::{Predicate, QueryFilter};
pub use service::{SeedSource, SyncConfig, SyncService};
pub use store::ResourceStore;
pub use subscriptions::{
    RecvError, SubscriberInfo, SubscriberState, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId, SubscriptionRegistry,
};
pub use types::*;
