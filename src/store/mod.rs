pub mod client;
pub mod error;
pub mod memory;
pub mod types;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{NewTimer, ProductionLog, ProductionTimer, TimerPatch, Workstation};

pub use client::RestRowStore;
pub use error::StoreError;
pub use memory::MemoryStore;

/// Tables of the hosted database this crate reads or watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Workstations,
    ProductionOrders,
    ProductionTimers,
    ProductionLogs,
    ProductionTimerEmployees,
    NonConformities,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workstations => "workstations",
            Self::ProductionOrders => "production_orders",
            Self::ProductionTimers => "production_timers",
            Self::ProductionLogs => "production_logs",
            Self::ProductionTimerEmployees => "production_timer_employees",
            Self::NonConformities => "non_conformities",
        }
    }

    /// Columns a change filter may narrow on.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Workstations => &["id", "name", "process_id"],
            Self::ProductionOrders => &["id", "code", "product_id", "total_quantity", "status"],
            Self::ProductionTimers => &[
                "id",
                "workstation_id",
                "production_order_id",
                "status",
                "start_time",
                "end_time",
                "efficiency",
            ],
            Self::ProductionLogs => &["id", "production_timer_id", "produced_units", "created_at"],
            Self::ProductionTimerEmployees => &["production_timer_id", "employee_id"],
            Self::NonConformities => &[
                "id",
                "production_timer_id",
                "production_order_id",
                "status",
            ],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column equality predicate narrowing a change subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub column: String,
    pub value: String,
}

impl ChangeFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a JSON row satisfies the predicate. Non-string scalars are
    /// compared by their JSON text.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        match record.get(&self.column) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Queries and single-row writes against the hosted row store.
///
/// Real implementation: [`RestRowStore`]. Test double: [`MemoryStore`].
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every workstation, unordered.
    async fn list_workstations(&self) -> Result<Vec<Workstation>, StoreError>;

    /// Timers in progress or paused, joined with order, product, logs and team.
    async fn list_active_timers(&self) -> Result<Vec<ProductionTimer>, StoreError>;

    async fn fetch_timer(&self, id: Uuid) -> Result<Option<ProductionTimer>, StoreError>;

    async fn insert_timer(&self, timer: &NewTimer) -> Result<(), StoreError>;

    async fn update_timer(&self, id: Uuid, patch: &TimerPatch) -> Result<(), StoreError>;

    async fn insert_log(&self, log: &ProductionLog) -> Result<(), StoreError>;

    async fn add_team_member(&self, timer_id: Uuid, employee_id: Uuid) -> Result<(), StoreError>;

    async fn remove_team_member(
        &self,
        timer_id: Uuid,
        employee_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Opaque fingerprint of a table's watched rows; changes whenever a
    /// relevant row is inserted, updated or deleted.
    async fn table_revision(
        &self,
        table: Table,
        filter: Option<&ChangeFilter>,
    ) -> Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names_match_database() {
        assert_eq!(Table::ProductionTimerEmployees.as_str(), "production_timer_employees");
        assert_eq!(Table::NonConformities.to_string(), "non_conformities");
        let json = serde_json::to_string(&Table::ProductionLogs).unwrap();
        assert_eq!(json, r#""production_logs""#);
    }

    #[test]
    fn filter_columns_are_per_table() {
        assert!(Table::ProductionTimers.has_column("workstation_id"));
        assert!(Table::ProductionTimers.has_column("efficiency"));
        assert!(!Table::ProductionLogs.has_column("workstation_id"));
        assert!(Table::ProductionLogs.has_column("production_timer_id"));
    }

    #[test]
    fn filter_matches_strings_and_scalars() {
        let f = ChangeFilter::eq("workstation_id", "abc");
        assert!(f.matches(&json!({"workstation_id": "abc"})));
        assert!(!f.matches(&json!({"workstation_id": "xyz"})));
        assert!(!f.matches(&json!({"other": "abc"})));
        assert!(!f.matches(&json!({"workstation_id": null})));

        let n = ChangeFilter::eq("produced_units", "5");
        assert!(n.matches(&json!({"produced_units": 5})));
    }
}
