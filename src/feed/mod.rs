//! Table change feeds.
//!
//! A [`ChangeFeed`] hands out [`Subscription`]s that yield a [`ChangeEvent`]
//! whenever a watched table changes. The shop-floor view does not look at the
//! event payload: any event means "refetch everything".
//!
//! Two feeds are provided:
//! - [`LocalFeed`] — in-process hub; writers publish, subscribers receive.
//! - [`PollingFeed`] — polls table revisions from a [`RowStore`](crate::store::RowStore).

mod local;
mod polling;
mod subscription;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{ChangeFilter, StoreError, Table};

pub use local::LocalFeed;
pub use polling::PollingFeed;
pub use subscription::Subscription;

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The table changed in some way a poller could not pin down.
    Detected,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// The affected row when known, `Null` otherwise.
    pub record: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record: serde_json::Value) -> Self {
        Self {
            table,
            kind,
            record,
            observed_at: Utc::now(),
        }
    }

    pub fn detected(table: Table) -> Self {
        Self::new(table, ChangeKind::Detected, serde_json::Value::Null)
    }
}

/// Which tables a subscription watches, optionally narrowed by a column predicate.
///
/// The predicate only narrows tables that have its column; other watched
/// tables are followed unfiltered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    pub tables: Vec<Table>,
    pub filter: Option<ChangeFilter>,
}

impl SubscriptionSpec {
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            filter: None,
        }
    }

    /// The four tables whose changes invalidate the shop-floor board.
    pub fn shop_floor() -> Self {
        Self::new([
            Table::ProductionTimers,
            Table::ProductionLogs,
            Table::ProductionTimerEmployees,
            Table::NonConformities,
        ])
    }

    pub fn with_filter(mut self, filter: ChangeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The predicate to apply to `table`, if its column exists there.
    pub fn filter_for(&self, table: Table) -> Option<&ChangeFilter> {
        self.filter.as_ref().filter(|f| table.has_column(&f.column))
    }

    /// Whether an event belongs to this subscription. Events without a row
    /// payload cannot be filtered and always pass the predicate.
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        if !self.tables.contains(&event.table) {
            return false;
        }
        match self.filter_for(event.table) {
            Some(filter) if !event.record.is_null() => filter.matches(&event.record),
            _ => true,
        }
    }
}

/// Source of table change subscriptions.
pub trait ChangeFeed {
    fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shop_floor_watches_four_tables() {
        let spec = SubscriptionSpec::shop_floor();
        assert_eq!(spec.tables.len(), 4);
        assert!(spec.tables.contains(&Table::NonConformities));
        assert!(!spec.tables.contains(&Table::Workstations));
        assert!(spec.filter.is_none());
    }

    #[test]
    fn accepts_by_table() {
        let spec = SubscriptionSpec::shop_floor();
        assert!(spec.accepts(&ChangeEvent::detected(Table::ProductionLogs)));
        assert!(!spec.accepts(&ChangeEvent::detected(Table::Workstations)));
    }

    #[test]
    fn accepts_applies_filter_to_payload() {
        let spec = SubscriptionSpec::new([Table::ProductionTimers])
            .with_filter(ChangeFilter::eq("workstation_id", "w-1"));

        let hit = ChangeEvent::new(
            Table::ProductionTimers,
            ChangeKind::Update,
            json!({"workstation_id": "w-1"}),
        );
        let miss = ChangeEvent::new(
            Table::ProductionTimers,
            ChangeKind::Update,
            json!({"workstation_id": "w-2"}),
        );
        assert!(spec.accepts(&hit));
        assert!(!spec.accepts(&miss));
        assert!(spec.accepts(&ChangeEvent::detected(Table::ProductionTimers)));
    }

    #[test]
    fn filter_skips_tables_without_its_column() {
        let spec = SubscriptionSpec::new([Table::ProductionTimers, Table::ProductionLogs])
            .with_filter(ChangeFilter::eq("workstation_id", "w-1"));

        assert!(spec.filter_for(Table::ProductionTimers).is_some());
        assert!(spec.filter_for(Table::ProductionLogs).is_none());

        let log = ChangeEvent::new(
            Table::ProductionLogs,
            ChangeKind::Insert,
            json!({"production_timer_id": "t-1", "produced_units": 4}),
        );
        assert!(spec.accepts(&log));
    }
}
