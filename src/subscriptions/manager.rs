//! Subscription registry: the sole authority on which subscribers are live.

use crate::types::Resource;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{
    DeliveryError, SubscriberInfo, SubscriberShared, SubscriberState, SubscriptionConfig,
    SubscriptionHandle, SubscriptionId,
};

/// Registry entry for one subscriber.
pub(crate) struct Subscriber {
    id: SubscriptionId,
    sender: Sender<Resource>,
    shared: Arc<SubscriberShared>,
}

impl Subscriber {
    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.shared.state() == SubscriberState::Active
    }

    /// Push an event without blocking.
    pub(crate) fn try_send(&self, resource: &Resource) -> Result<(), DeliveryError> {
        match self.sender.try_send(resource.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.record_drop();
                Err(DeliveryError::SubscriberOverflow(self.id))
            }
            Err(TrySendError::Disconnected(_)) => Err(DeliveryError::Disconnected(self.id)),
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.shared.dropped()
    }

    fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.id,
            state: self.shared.state(),
            dropped_events: self.shared.dropped(),
        }
    }
}

pub(crate) type SubscriberMap = HashMap<SubscriptionId, Subscriber>;

/// Tracks live subscribers and their bounded delivery queues.
pub struct SubscriptionRegistry {
    /// Live subscriptions by ID.
    subscribers: RwLock<SubscriberMap>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Config used by [`subscribe_default`](Self::subscribe_default).
    default_config: SubscriptionConfig,
}

impl SubscriptionRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    /// Create a new registry whose default subscriptions use `config`.
    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_config: config,
        }
    }

    /// Register a new Active subscriber with an empty queue.
    ///
    /// The handle keeps a weak reference back to the registry so it can
    /// unsubscribe itself on drop.
    pub fn subscribe(self: &Arc<Self>, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let shared = Arc::new(SubscriberShared::new());

        let subscriber = Subscriber {
            id,
            sender,
            shared: Arc::clone(&shared),
        };

        self.subscribers.write().insert(id, subscriber);
        info!(subscription = %id, buffer_size = config.buffer_size, "Subscribed");

        SubscriptionHandle::new(id, receiver, shared, Arc::downgrade(self))
    }

    /// Subscribe with the registry's default config.
    pub fn subscribe_default(self: &Arc<Self>) -> SubscriptionHandle {
        self.subscribe(self.default_config.clone())
    }

    /// Unsubscribe and release the delivery queue. Idempotent.
    ///
    /// Publishes deliver under the read lock, so once this returns no
    /// later publish can reach the subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscribers.read().get(&id) {
            sub.shared.begin_close();
        }

        let removed = self.subscribers.write().remove(&id);
        if let Some(sub) = removed {
            sub.shared.mark_closed();
            info!(subscription = %id, "Unsubscribed");
        }
    }

    /// Close every subscriber.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Subscriber> = {
            let mut subs = self.subscribers.write();
            for sub in subs.values() {
                sub.shared.begin_close();
            }
            subs.drain().map(|(_, sub)| sub).collect()
        };

        for sub in &drained {
            sub.shared.mark_closed();
        }

        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all subscriptions");
        }
        drained.len()
    }

    /// Currently registered subscribers, in id order.
    pub fn list_active(&self) -> Vec<SubscriberInfo> {
        let mut infos: Vec<SubscriberInfo> = self
            .subscribers
            .read()
            .values()
            .filter(|sub| sub.is_active())
            .map(Subscriber::info)
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Total events dropped across registered subscribers.
    pub fn events_dropped(&self) -> u64 {
        self.subscribers.read().values().map(Subscriber::dropped).sum()
    }

    /// Read access to the live set for the duration of one publish.
    ///
    /// Holding the guard blocks subscribe/unsubscribe, which is what makes
    /// the publish-time view stable.
    pub(crate) fn read_live(&self) -> RwLockReadGuard<'_, SubscriberMap> {
        self.subscribers.read()
    }

    /// Remove subscribers whose receivers have gone away.
    pub(crate) fn reap(&self, ids: &[SubscriptionId]) {
        if ids.is_empty() {
            return;
        }

        let mut subs = self.subscribers.write();
        for id in ids {
            if let Some(sub) = subs.remove(id) {
                sub.shared.mark_closed();
                debug!(subscription = %id, "Reaped disconnected subscriber");
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::RecvError;
    use crate::types::Status;
    use std::time::Duration;

    fn ec2() -> Resource {
        Resource::new("1", "AWS EC2", "Compute", Status::Active)
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = Arc::new(SubscriptionRegistry::new());

        let handle = registry.subscribe(SubscriptionConfig::default());
        assert_eq!(registry.subscription_count(), 1);
        assert_eq!(handle.state(), SubscriberState::Active);

        registry.unsubscribe(handle.id());
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(handle.state(), SubscriberState::Closed);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handle = registry.subscribe_default();

        handle.unsubscribe();
        handle.unsubscribe();
        registry.unsubscribe(handle.id());
        registry.unsubscribe(SubscriptionId(999));

        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(handle.state(), SubscriberState::Closed);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let a = registry.subscribe_default().id();
        let b = registry.subscribe_default().id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_drop_handle_unsubscribes() {
        let registry = Arc::new(SubscriptionRegistry::new());
        {
            let _handle = registry.subscribe_default();
            assert_eq!(registry.subscription_count(), 1);
        }
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_list_active() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let a = registry.subscribe_default();
        let b = registry.subscribe_default();
        let c = registry.subscribe_default();
        b.unsubscribe();

        let ids: Vec<_> = registry.list_active().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
    }

    #[test]
    fn test_overflow_drops_event_not_subscriber() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handle = registry.subscribe(SubscriptionConfig { buffer_size: 2 });

        let guard = registry.read_live();
        let sub = guard.get(&handle.id()).unwrap();
        assert!(sub.try_send(&ec2()).is_ok());
        assert!(sub.try_send(&ec2()).is_ok());
        assert_eq!(
            sub.try_send(&ec2()),
            Err(DeliveryError::SubscriberOverflow(handle.id()))
        );
        drop(guard);

        assert_eq!(registry.subscription_count(), 1);
        assert_eq!(handle.dropped_events(), 1);
        assert_eq!(registry.events_dropped(), 1);
        assert!(handle.recv_timeout(Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn test_closed_handle_refuses_queued_events() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handle = registry.subscribe_default();

        registry.read_live().get(&handle.id()).unwrap().try_send(&ec2()).unwrap();
        assert_eq!(handle.pending(), 1);

        handle.unsubscribe();
        assert_eq!(handle.try_recv(), Err(RecvError::Closed));
        assert_eq!(handle.recv(), Err(RecvError::Closed));
        assert_eq!(handle.iter().count(), 0);
    }

    #[test]
    fn test_close_all() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handles: Vec<_> = (0..3).map(|_| registry.subscribe_default()).collect();

        assert_eq!(registry.close_all(), 3);
        assert_eq!(registry.subscription_count(), 0);
        assert!(handles.iter().all(|h| h.state() == SubscriberState::Closed));
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handle = registry.subscribe_default();
        drop(registry);

        assert_eq!(handle.try_recv(), Err(RecvError::Closed));
        handle.unsubscribe();
        assert_eq!(handle.state(), SubscriberState::Closed);
    }
}
