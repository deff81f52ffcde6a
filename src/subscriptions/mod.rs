//! Subscription system for live resource updates.
//!
//! Each subscriber owns a bounded queue fed by the
//! [`NotificationBus`](crate::bus::NotificationBus):
//! - Registration returns immediately with an Active handle
//! - Publishing never blocks; a full queue drops the event for that
//!   subscriber only
//! - Unsubscribing (or dropping the handle) closes the subscription
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SubscriptionRegistry::new());
//! let handle = registry.subscribe(SubscriptionConfig::default());
//!
//! for resource in handle.iter() {
//!     println!("{} is now {}", resource.id, resource.status);
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionRegistry;
pub(crate) use manager::Subscriber;
pub(crate) use types::DeliveryError;
pub use types::{
    RecvError, SubscriberInfo, SubscriberState, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId, DEFAULT_BUFFER_SIZE,
};
