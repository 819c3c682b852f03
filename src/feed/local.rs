use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::{ChangeEvent, ChangeFeed, Subscription, SubscriptionSpec};
use crate::store::StoreError;

/// Events buffered per subscriber before newer ones are dropped.
const CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    id: u64,
    spec: SubscriptionSpec,
    tx: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct Hub {
    next_id: u64,
    subscribers: Vec<Subscriber>,
    released: u64,
}

/// In-process change feed.
///
/// Cloning shares the same hub. Writers call [`LocalFeed::publish`]; every
/// matching subscription receives the event.
#[derive(Clone, Default)]
pub struct LocalFeed {
    hub: Arc<Mutex<Hub>>,
}

impl LocalFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delivers `event` to every matching subscriber and returns how many got it.
    ///
    /// A subscriber whose queue is full already has a refetch pending, so the
    /// event is dropped for it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut hub = self.hub();
        let mut delivered = 0;
        hub.subscribers.retain(|sub| {
            if !sub.spec.accepts(&event) {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!(
                        subscriber = sub.id,
                        table = %event.table,
                        "queue full, event coalesced"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub().subscribers.len()
    }

    /// Number of subscriptions released so far.
    pub fn released_count(&self) -> u64 {
        self.hub().released
    }
}

impl ChangeFeed for LocalFeed {
    fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let id = {
            let mut hub = self.hub();
            hub.next_id += 1;
            let id = hub.next_id;
            hub.subscribers.push(Subscriber { id, spec, tx });
            id
        };
        debug!(subscriber = id, "local subscription opened");

        let hub = Arc::clone(&self.hub);
        Ok(Subscription::new(rx, move || {
            let mut hub = hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            hub.subscribers.retain(|s| s.id != id);
            hub.released += 1;
        }))
    }
}
