//! In-memory row store.
//!
//! Implements [`RowStore`] over plain vectors so the view controller, the
//! write boundary and the feeds can be exercised without a backend. Writes
//! bump a per-table revision and, when a [`LocalFeed`] is attached, publish a
//! change event the way the hosted database's realtime channel would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use super::{ChangeFilter, RowStore, StoreError, Table};
use crate::feed::{ChangeEvent, ChangeKind, LocalFeed};
use crate::model::{
    NewTimer, Product, ProductionLog, ProductionOrder, ProductionTimer, TeamMember, TimerPatch,
    TimerStatus, Workstation,
};

#[derive(Debug, Clone)]
struct TimerRecord {
    id: Uuid,
    workstation_id: Uuid,
    status: TimerStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    order_id: Option<Uuid>,
    efficiency: Option<f64>,
}

#[derive(Default)]
struct Tables {
    workstations: Vec<Workstation>,
    orders: HashMap<Uuid, ProductionOrder>,
    employees: HashMap<Uuid, String>,
    timers: Vec<TimerRecord>,
    logs: Vec<ProductionLog>,
    team: Vec<(Uuid, Uuid)>,
    revisions: HashMap<Table, u64>,
}

impl Tables {
    fn bump(&mut self, table: Table) {
        *self.revisions.entry(table).or_insert(0) += 1;
    }

    fn join(&self, record: &TimerRecord) -> ProductionTimer {
        let produced_total = self
            .logs
            .iter()
            .filter(|l| l.timer_id == record.id)
            .map(|l| u64::from(l.produced_units))
            .sum();
        let team = self
            .team
            .iter()
            .filter(|(timer_id, _)| *timer_id == record.id)
            .map(|&(_, employee_id)| TeamMember {
                employee_id,
                name: self
                    .employees
                    .get(&employee_id)
                    .cloned()
                    .unwrap_or_else(|| employee_id.to_string()),
            })
            .collect();
        ProductionTimer {
            id: record.id,
            workstation_id: record.workstation_id,
            status: record.status,
            start_time: record.start_time,
            end_time: record.end_time,
            order: record.order_id.and_then(|id| self.orders.get(&id).cloned()),
            produced_total,
            efficiency: record.efficiency,
            team,
        }
    }
}

/// Row store double backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed: Option<LocalFeed>,
    failing_reads: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    revision_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that publishes every write to `feed`.
    pub fn with_feed(feed: LocalFeed) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, table: Table, kind: ChangeKind, record: serde_json::Value) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent::new(table, kind, record));
        }
    }

    /// Makes the next `n` list queries fail with [`StoreError::Unavailable`].
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Delays list queries after their rows have been read.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self
            .read_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    /// How many revision fingerprints have been served.
    pub fn revision_reads(&self) -> usize {
        self.revision_reads.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let injected = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    async fn settle(&self) {
        let delay = *self
            .read_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn add_workstation(&self, name: &str, process: Option<&str>) -> Workstation {
        let workstation = Workstation {
            id: Uuid::new_v4(),
            name: name.to_string(),
            process_name: process.map(str::to_string),
        };
        let mut tables = self.tables();
        tables.workstations.push(workstation.clone());
        tables.bump(Table::Workstations);
        workstation
    }

    pub fn remove_workstation(&self, id: Uuid) {
        let mut tables = self.tables();
        tables.workstations.retain(|w| w.id != id);
        tables.bump(Table::Workstations);
    }

    pub fn add_order(&self, code: &str, total_quantity: u64, product: &str) -> ProductionOrder {
        let order = ProductionOrder {
            id: Uuid::new_v4(),
            code: code.to_string(),
            total_quantity,
            status: "in_production".to_string(),
            product: Some(Product {
                name: product.to_string(),
                reference: None,
            }),
        };
        let mut tables = self.tables();
        tables.orders.insert(order.id, order.clone());
        tables.bump(Table::ProductionOrders);
        order
    }

    pub fn add_employee(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables().employees.insert(id, name.to_string());
        id
    }

    /// Seeds an in-progress timer without going through the write boundary.
    pub fn start_timer_row(&self, workstation_id: Uuid, order_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let mut tables = self.tables();
        tables.timers.push(TimerRecord {
            id,
            workstation_id,
            status: TimerStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            order_id: Some(order_id),
            efficiency: None,
        });
        tables.bump(Table::ProductionTimers);
        id
    }

    /// Sets the externally computed efficiency of a timer.
    pub fn set_efficiency(&self, timer_id: Uuid, efficiency: Option<f64>) {
        let mut tables = self.tables();
        if let Some(t) = tables.timers.iter_mut().find(|t| t.id == timer_id) {
            t.efficiency = efficiency;
        }
        tables.bump(Table::ProductionTimers);
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn list_workstations(&self) -> Result<Vec<Workstation>, StoreError> {
        self.take_failure()?;
        let rows = self.tables().workstations.clone();
        self.settle().await;
        Ok(rows)
    }

    async fn list_active_timers(&self) -> Result<Vec<ProductionTimer>, StoreError> {
        self.take_failure()?;
        let rows: Vec<ProductionTimer> = {
            let tables = self.tables();
            tables
                .timers
                .iter()
                .filter(|t| t.status.is_active())
                .map(|t| tables.join(t))
                .collect()
        };
        self.settle().await;
        Ok(rows)
    }

    async fn fetch_timer(&self, id: Uuid) -> Result<Option<ProductionTimer>, StoreError> {
        let tables = self.tables();
        Ok(tables
            .timers
            .iter()
            .find(|t| t.id == id)
            .map(|t| tables.join(t)))
    }

    async fn insert_timer(&self, timer: &NewTimer) -> Result<(), StoreError> {
        let id = Uuid::new_v4();
        {
            let mut tables = self.tables();
            tables.timers.push(TimerRecord {
                id,
                workstation_id: timer.workstation_id,
                status: timer.status,
                start_time: timer.start_time,
                end_time: None,
                order_id: Some(timer.production_order_id),
                efficiency: None,
            });
            tables.bump(Table::ProductionTimers);
        }
        self.publish(
            Table::ProductionTimers,
            ChangeKind::Insert,
            json!({"id": id, "workstation_id": timer.workstation_id, "status": timer.status}),
        );
        Ok(())
    }

    async fn update_timer(&self, id: Uuid, patch: &TimerPatch) -> Result<(), StoreError> {
        let workstation_id = {
            let mut tables = self.tables();
            let Some(record) = tables.timers.iter_mut().find(|t| t.id == id) else {
                return Err(StoreError::Api {
                    status: 404,
                    message: format!("timer {id} not found"),
                });
            };
            record.status = patch.status;
            if patch.end_time.is_some() {
                record.end_time = patch.end_time;
            }
            let workstation_id = record.workstation_id;
            tables.bump(Table::ProductionTimers);
            workstation_id
        };
        self.publish(
            Table::ProductionTimers,
            ChangeKind::Update,
            json!({"id": id, "workstation_id": workstation_id, "status": patch.status}),
        );
        Ok(())
    }

    async fn insert_log(&self, log: &ProductionLog) -> Result<(), StoreError> {
        {
            let mut tables = self.tables();
            tables.logs.push(log.clone());
            tables.bump(Table::ProductionLogs);
        }
        self.publish(
            Table::ProductionLogs,
            ChangeKind::Insert,
            json!({"production_timer_id": log.timer_id, "produced_units": log.produced_units}),
        );
        Ok(())
    }

    async fn add_team_member(&self, timer_id: Uuid, employee_id: Uuid) -> Result<(), StoreError> {
        {
            let mut tables = self.tables();
            if tables.team.contains(&(timer_id, employee_id)) {
                return Err(StoreError::Api {
                    status: 409,
                    message: "duplicate key value violates unique constraint".into(),
                });
            }
            tables.team.push((timer_id, employee_id));
            tables.bump(Table::ProductionTimerEmployees);
        }
        self.publish(
            Table::ProductionTimerEmployees,
            ChangeKind::Insert,
            json!({"production_timer_id": timer_id, "employee_id": employee_id}),
        );
        Ok(())
    }

    async fn remove_team_member(
        &self,
        timer_id: Uuid,
        employee_id: Uuid,
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.tables();
            tables.team.retain(|&pair| pair != (timer_id, employee_id));
            tables.bump(Table::ProductionTimerEmployees);
        }
        self.publish(
            Table::ProductionTimerEmployees,
            ChangeKind::Delete,
            json!({"production_timer_id": timer_id, "employee_id": employee_id}),
        );
        Ok(())
    }

    /// Filters are ignored: any write to the table moves its revision.
    async fn table_revision(
        &self,
        table: Table,
        _filter: Option<&ChangeFilter>,
    ) -> Result<String, StoreError> {
        self.revision_reads.fetch_add(1, Ordering::SeqCst);
        let revision = self.tables().revisions.get(&table).copied().unwrap_or(0);
        Ok(revision.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ChangeFeed, SubscriptionSpec};

    #[tokio::test]
    async fn active_timers_are_joined() {
        let store = MemoryStore::new();
        let ws = store.add_workstation("Telar 1", Some("Tejido"));
        let order = store.add_order("OP-7", 500, "Piqué");
        let ana = store.add_employee("Ana");
        let timer = store.start_timer_row(ws.id, order.id);
        store.add_team_member(timer, ana).await.unwrap();
        for units in [100, 50] {
            store
                .insert_log(&ProductionLog {
                    timer_id: timer,
                    produced_units: units,
                    logged_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let timers = store.list_active_timers().await.unwrap();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].produced_total, 150);
        assert_eq!(timers[0].order.as_ref().unwrap().code, "OP-7");
        assert_eq!(timers[0].team[0].name, "Ana");
    }

    #[tokio::test]
    async fn stopped_timers_are_not_listed() {
        let store = MemoryStore::new();
        let ws = store.add_workstation("Telar 1", None);
        let order = store.add_order("OP-7", 500, "Piqué");
        let timer = store.start_timer_row(ws.id, order.id);

        store
            .update_timer(
                timer,
                &TimerPatch {
                    status: TimerStatus::Stopped,
                    end_time: Some(Utc::now()),
                },
            )
            .await
            .unwrap();

        assert!(store.list_active_timers().await.unwrap().is_empty());
        let stopped = store.fetch_timer(timer).await.unwrap().unwrap();
        assert!(stopped.end_time.is_some());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_reads(1);
        assert!(store.list_workstations().await.is_err());
        assert!(store.list_workstations().await.is_ok());
    }

    #[tokio::test]
    async fn writes_publish_to_attached_feed() {
        let feed = LocalFeed::new();
        let store = MemoryStore::with_feed(feed.clone());
        let mut sub = feed.subscribe(SubscriptionSpec::shop_floor()).unwrap();
        let ws = store.add_workstation("Telar 1", None);
        let order = store.add_order("OP-1", 10, "Jersey");
        let timer = store.start_timer_row(ws.id, order.id);

        store
            .insert_log(&ProductionLog {
                timer_id: timer,
                produced_units: 3,
                logged_at: Utc::now(),
            })
            .await
            .unwrap();

        let event = sub.try_next().unwrap();
        assert_eq!(event.table, Table::ProductionLogs);
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn revisions_move_per_table() {
        let store = MemoryStore::new();
        let before = store.table_revision(Table::ProductionLogs, None).await.unwrap();
        store.add_workstation("Telar 1", None);
        let unchanged = store.table_revision(Table::ProductionLogs, None).await.unwrap();
        assert_eq!(before, unchanged);
        assert_eq!(store.revision_reads(), 2);
    }

    #[tokio::test]
    async fn duplicate_team_member_conflicts() {
        let store = MemoryStore::new();
        let timer = Uuid::new_v4();
        let ana = store.add_employee("Ana");
        store.add_team_member(timer, ana).await.unwrap();
        let err = store.add_team_member(timer, ana).await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 409, .. }));
    }
}
