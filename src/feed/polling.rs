use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{ChangeEvent, ChangeFeed, Subscription, SubscriptionSpec};
use crate::store::{RowStore, StoreError, Table};

/// Change feed that polls table revisions from a row store.
///
/// Each subscription runs its own background task. The first poll only
/// records a baseline; later polls emit a `Detected` event for every watched
/// table whose revision moved. Failed polls are logged and retried on the
/// next tick.
pub struct PollingFeed<S> {
    store: Arc<S>,
    interval: Duration,
}

impl<S: RowStore + 'static> PollingFeed<S> {
    pub fn new(store: Arc<S>, interval: Duration) -> Self {
        Self { store, interval }
    }
}

impl<S: RowStore + 'static> ChangeFeed for PollingFeed<S> {
    fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription, StoreError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| StoreError::Unavailable("polling feed needs a tokio runtime".into()))?;
        let (tx, rx) = mpsc::channel(spec.tables.len().max(1) * 4);
        let task = runtime.spawn(poll_revisions(
            Arc::clone(&self.store),
            spec,
            tx,
            self.interval,
        ));
        Ok(Subscription::new(rx, move || task.abort()))
    }
}

async fn poll_revisions<S: RowStore>(
    store: Arc<S>,
    spec: SubscriptionSpec,
    tx: mpsc::Sender<ChangeEvent>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: HashMap<Table, String> = HashMap::new();

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            debug!("polling subscription closed");
            return;
        }
        for &table in &spec.tables {
            let revision = match store.table_revision(table, spec.filter_for(table)).await {
                Ok(revision) => revision,
                Err(e) => {
                    warn!(%table, error = %e, "revision poll failed");
                    continue;
                }
            };
            let changed = last.get(&table).is_some_and(|prev| *prev != revision);
            last.insert(table, revision);
            if changed {
                debug!(%table, "change detected");
                if tx.send(ChangeEvent::detected(table)).await.is_err() {
                    return;
                }
            }
        }
    }
}
