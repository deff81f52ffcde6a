//! Fan-out of changed resources to every live subscriber.

use crate::subscriptions::{DeliveryError, Subscriber, SubscriptionId, SubscriptionRegistry};
use crate::types::Resource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that got the event queued.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
    /// Subscribers whose receiver had gone away (now removed).
    pub disconnected: usize,
}

/// Broadcasts resources to the subscribers registered in a
/// [`SubscriptionRegistry`].
pub struct NotificationBus {
    registry: Arc<SubscriptionRegistry>,
    published: AtomicU64,
}

impl NotificationBus {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            published: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Number of publish calls so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Deliver `resource` to every subscriber Active at publish time.
    ///
    /// Never blocks on a subscriber and never fails: overflow drops the
    /// event for that subscriber only.
    pub fn publish(&self, resource: &Resource) -> PublishReport {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut report = PublishReport::default();
        let mut gone: Vec<SubscriptionId> = Vec::new();

        {
            let live = self.registry.read_live();
            for sub in live.values().filter(|sub| sub.is_active()) {
                match deliver(sub, resource) {
                    Ok(()) => report.delivered += 1,
                    Err(DeliveryError::SubscriberOverflow(_)) => report.dropped += 1,
                    Err(DeliveryError::Disconnected(id)) => {
                        report.disconnected += 1;
                        gone.push(id);
                    }
                }
            }
        }

        self.registry.reap(&gone);

        debug!(
            resource = %resource.id,
            delivered = report.delivered,
            dropped = report.dropped,
            disconnected = report.disconnected,
            "Published"
        );
        report
    }
}

fn deliver(sub: &Subscriber, resource: &Resource) -> Result<(), DeliveryError> {
    let result = sub.try_send(resource);
    if let Err(e @ DeliveryError::SubscriberOverflow(_)) = &result {
        warn!(
            subscription = %sub.id(),
            resource = %resource.id,
            dropped_total = sub.dropped(),
            "{}; event dropped",
            e
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::{RecvError, SubscriptionConfig};
    use crate::types::Status;
    use std::time::Duration;

    fn make_resource(id: &str, status: Status) -> Resource {
        Resource::new(id, format!("Resource {}", id), "Compute", status)
    }

    fn bus() -> NotificationBus {
        NotificationBus::new(Arc::new(SubscriptionRegistry::new()))
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = bus();
        let a = bus.registry().subscribe_default();
        let b = bus.registry().subscribe_default();

        let resource = make_resource("1", Status::Inactive);
        let report = bus.publish(&resource);
        assert_eq!(report.delivered, 2);

        assert_eq!(a.recv_timeout(Duration::from_millis(100)).unwrap(), resource);
        assert_eq!(b.recv_timeout(Duration::from_millis(100)).unwrap(), resource);
        assert_eq!(a.try_recv(), Err(RecvError::Empty));
    }

    #[test]
    fn test_publish_with_no_subscribers() {
        let bus = bus();
        assert_eq!(bus.publish(&make_resource("1", Status::Active)), PublishReport::default());
        assert_eq!(bus.published(), 1);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_event() {
        let bus = bus();
        bus.publish(&make_resource("1", Status::Active));

        let late = bus.registry().subscribe_default();
        assert_eq!(late.try_recv(), Err(RecvError::Empty));
    }

    #[test]
    fn test_per_subscriber_order() {
        let bus = bus();
        let handle = bus.registry().subscribe_default();

        for i in 0..50 {
            bus.publish(&make_resource(&i.to_string(), Status::Active));
        }

        let ids: Vec<String> = (0..50)
            .map(|_| handle.try_recv().unwrap().id.0)
            .collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let bus = bus();
        let slow = bus.registry().subscribe(SubscriptionConfig { buffer_size: 2 });
        let fast = bus.registry().subscribe(SubscriptionConfig { buffer_size: 100 });

        for i in 0..10 {
            bus.publish(&make_resource(&i.to_string(), Status::Active));
        }

        // Slow subscriber keeps the first two, drops the rest, stays registered
        assert_eq!(slow.pending(), 2);
        assert_eq!(slow.dropped_events(), 8);
        assert!(slow.is_active());
        assert_eq!(slow.try_recv().unwrap().id.as_str(), "0");
        assert_eq!(slow.try_recv().unwrap().id.as_str(), "1");

        assert_eq!(fast.pending(), 10);
        assert_eq!(fast.dropped_events(), 0);
    }

    #[test]
    fn test_unsubscribed_is_skipped() {
        let bus = bus();
        let gone = bus.registry().subscribe_default();
        let kept = bus.registry().subscribe_default();
        gone.unsubscribe();

        let report = bus.publish(&make_resource("3", Status::Active));
        assert_eq!(report.delivered, 1);
        assert_eq!(gone.try_recv(), Err(RecvError::Closed));
        assert!(kept.try_recv().is_ok());
    }
}
