//! Subscription types for live resource updates.

use crate::types::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

use super::manager::SubscriptionRegistry;

/// Default per-subscriber queue depth.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Configuration for a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max queued events before new events are dropped for this subscriber.
    /// Default: 256
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Unique identifier for a subscription. Never reused within a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscriber: `Active -> Closing -> Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    Active,
    /// Unsubscribe has started; publishes skip this subscriber.
    Closing,
    Closed,
}

impl SubscriberState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SubscriberState::Active,
            1 => SubscriberState::Closing,
            _ => SubscriberState::Closed,
        }
    }
}

/// State shared between a registry entry and its handle.
#[derive(Debug)]
pub(crate) struct SubscriberShared {
    state: AtomicU8,
    dropped: AtomicU64,
}

impl SubscriberShared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SubscriberState::Active as u8),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> SubscriberState {
        SubscriberState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Active -> Closing. Leaves Closed alone.
    pub(crate) fn begin_close(&self) {
        let _ = self.state.compare_exchange(
            SubscriberState::Active as u8,
            SubscriberState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(SubscriberState::Closed as u8, Ordering::Release);
    }

    pub(crate) fn record_drop(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Snapshot of one registered subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberInfo {
    pub id: SubscriptionId,
    pub state: SubscriberState,
    pub dropped_events: u64,
}

/// Why a subscriber did not receive an event. Never surfaced to publishers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryError {
    #[error("delivery queue full for {0}")]
    SubscriberOverflow(SubscriptionId),

    #[error("receiver for {0} is gone")]
    Disconnected(SubscriptionId),
}

/// Errors from receiving on a subscription handle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error("subscription is closed")]
    Closed,

    #[error("no event available")]
    Empty,

    #[error("timed out waiting for an event")]
    Timeout,
}

/// Caller's end of a subscription.
///
/// Dropping the handle unsubscribes, so a torn-down connection releases its
/// queue without an explicit call.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    receiver: crossbeam_channel::Receiver<Resource>,
    shared: Arc<SubscriberShared>,
    registry: Weak<SubscriptionRegistry>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: crossbeam_channel::Receiver<Resource>,
        shared: Arc<SubscriberShared>,
        registry: Weak<SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            receiver,
            shared,
            registry,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriberState::Active
    }

    /// Events dropped for this subscriber because its queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped()
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Receive the next event (blocking until one arrives or the
    /// subscription closes).
    pub fn recv(&self) -> Result<Resource, RecvError> {
        self.ensure_open()?;
        let resource = self.receiver.recv().map_err(|_| RecvError::Closed)?;
        self.ensure_open()?;
        Ok(resource)
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<Resource, RecvError> {
        self.ensure_open()?;
        let resource = self.receiver.try_recv().map_err(|e| match e {
            crossbeam_channel::TryRecvError::Empty => RecvError::Empty,
            crossbeam_channel::TryRecvError::Disconnected => RecvError::Closed,
        })?;
        self.ensure_open()?;
        Ok(resource)
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Resource, RecvError> {
        self.ensure_open()?;
        let resource = self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => RecvError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => RecvError::Closed,
        })?;
        self.ensure_open()?;
        Ok(resource)
    }

    /// Blocking iterator over incoming events; ends when the subscription
    /// closes.
    pub fn iter(&self) -> impl Iterator<Item = Resource> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }

    /// Unsubscribe. Idempotent.
    pub fn unsubscribe(&self) {
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(self.id),
            None => self.shared.mark_closed(),
        }
    }

    fn ensure_open(&self) -> Result<(), RecvError> {
        match self.shared.state() {
            SubscriberState::Active => Ok(()),
            _ => Err(RecvError::Closed),
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if self.shared.state() != SubscriberState::Closed {
            self.unsubscribe();
        }
    }
}
