//! Wire rows returned by the backend's row API and their conversion into
//! domain types.
//!
//! Joins are expressed with embedded selects, so a timer row arrives with its
//! order, product, logs and team nested inside it. Every embedded relation is
//! optional on the wire: a dangling foreign key comes back as `null` and must
//! not fail the whole query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Product, ProductionOrder, ProductionTimer, TeamMember, TimerStatus, Workstation,
};

/// Embedded select used for `workstations`.
pub const WORKSTATION_SELECT: &str = "id,name,processes(name)";

/// Embedded select used for `production_timers`.
pub const TIMER_SELECT: &str = "id,workstation_id,status,start_time,end_time,efficiency,\
production_orders(id,code,total_quantity,status,products(name,reference)),\
production_logs(produced_units),\
production_timer_employees(employee_id,employees(full_name))";

#[derive(Debug, Clone, Deserialize)]
pub struct WorkstationRow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub processes: Option<NameRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameRow {
    pub name: String,
}

impl From<WorkstationRow> for Workstation {
    fn from(row: WorkstationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            process_name: row.processes.map(|p| p.name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRow {
    pub name: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub id: Uuid,
    pub code: String,
    #[serde(default)]
    pub total_quantity: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub products: Option<ProductRow>,
}

impl From<OrderRow> for ProductionOrder {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            total_quantity: row.total_quantity.max(0) as u64,
            status: row.status,
            product: row.products.map(|p| Product {
                name: p.name,
                reference: p.reference,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogUnitsRow {
    pub produced_units: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeRow {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRow {
    pub employee_id: Uuid,
    #[serde(default)]
    pub employees: Option<EmployeeRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimerRow {
    pub id: Uuid,
    pub workstation_id: Uuid,
    pub status: TimerStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub production_orders: Option<OrderRow>,
    #[serde(default)]
    pub production_logs: Vec<LogUnitsRow>,
    #[serde(default)]
    pub production_timer_employees: Vec<TeamRow>,
}

impl From<TimerRow> for ProductionTimer {
    fn from(row: TimerRow) -> Self {
        let produced_total = row
            .production_logs
            .iter()
            .map(|l| l.produced_units.max(0) as u64)
            .sum();
        let team = row
            .production_timer_employees
            .into_iter()
            .map(|t| TeamMember {
                employee_id: t.employee_id,
                name: t
                    .employees
                    .map(|e| e.full_name)
                    .unwrap_or_else(|| t.employee_id.to_string()),
            })
            .collect();
        Self {
            id: row.id,
            workstation_id: row.workstation_id,
            status: row.status,
            start_time: row.start_time,
            end_time: row.end_time,
            order: row.production_orders.map(ProductionOrder::from),
            produced_total,
            efficiency: row.efficiency,
            team,
        }
    }
}

/// Body of a `production_logs` insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogInsert {
    pub production_timer_id: Uuid,
    pub produced_units: u32,
    pub created_at: DateTime<Utc>,
}

/// Body of a `production_timer_employees` insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamInsert {
    pub production_timer_id: Uuid,
    pub employee_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_row_from_api_format() {
        let json = r#"{
            "id": "6f1c8a52-4d7e-4a53-9a8f-0d7b2f3a1c01",
            "workstation_id": "0b2f0d0e-8c55-4b9c-93a5-2a4f1f6d7e02",
            "status": "in_progress",
            "start_time": "2024-05-02T08:00:00+00:00",
            "end_time": null,
            "efficiency": 0.91,
            "production_orders": {
                "id": "a3d5e7f9-1b2c-4d6e-8f0a-1c3e5a7b9d03",
                "code": "OP-2024-0012",
                "total_quantity": 1000,
                "status": "in_production",
                "products": {"name": "Jersey 30/1", "reference": "REF-001"}
            },
            "production_logs": [{"produced_units": 300}, {"produced_units": 220}],
            "production_timer_employees": [
                {"employee_id": "c4e6a8b0-2d4f-4a6c-8e0a-2b4d6f8a0c04", "employees": {"full_name": "Ana Ruiz"}}
            ]
        }"#;
        let row: TimerRow = serde_json::from_str(json).unwrap();
        let timer = ProductionTimer::from(row);

        assert_eq!(timer.status, TimerStatus::InProgress);
        assert_eq!(timer.produced_total, 520);
        assert_eq!(timer.efficiency, Some(0.91));
        let order = timer.order.unwrap();
        assert_eq!(order.code, "OP-2024-0012");
        assert_eq!(order.total_quantity, 1000);
        assert_eq!(order.product.unwrap().reference.as_deref(), Some("REF-001"));
        assert_eq!(timer.team.len(), 1);
        assert_eq!(timer.team[0].name, "Ana Ruiz");
    }

    #[test]
    fn dangling_relations_decode_as_empty() {
        let json = r#"{
            "id": "6f1c8a52-4d7e-4a53-9a8f-0d7b2f3a1c01",
            "workstation_id": "0b2f0d0e-8c55-4b9c-93a5-2a4f1f6d7e02",
            "status": "paused",
            "start_time": "2024-05-02T08:00:00Z",
            "production_orders": null
        }"#;
        let row: TimerRow = serde_json::from_str(json).unwrap();
        let timer = ProductionTimer::from(row);

        assert!(timer.order.is_none());
        assert_eq!(timer.produced_total, 0);
        assert!(timer.team.is_empty());
        assert_eq!(timer.efficiency, None);
    }

    #[test]
    fn negative_quantities_are_floored() {
        let row = OrderRow {
            id: Uuid::nil(),
            code: "OP-X".into(),
            total_quantity: -5,
            status: String::new(),
            products: None,
        };
        assert_eq!(ProductionOrder::from(row).total_quantity, 0);
    }

    #[test]
    fn workstation_row_carries_process_name() {
        let json = r#"[
            {"id": "0b2f0d0e-8c55-4b9c-93a5-2a4f1f6d7e02", "name": "Telar 03", "processes": {"name": "Tejido"}},
            {"id": "1b2f0d0e-8c55-4b9c-93a5-2a4f1f6d7e02", "name": "Rama 1", "processes": null}
        ]"#;
        let rows: Vec<WorkstationRow> = serde_json::from_str(json).unwrap();
        let ws: Vec<Workstation> = rows.into_iter().map(Workstation::from).collect();

        assert_eq!(ws[0].process_name.as_deref(), Some("Tejido"));
        assert_eq!(ws[1].process_name, None);
    }

    #[test]
    fn team_member_without_employee_row_falls_back_to_id() {
        let employee_id = Uuid::new_v4();
        let row = TeamRow {
            employee_id,
            employees: None,
        };
        let timer = ProductionTimer::from(TimerRow {
            id: Uuid::new_v4(),
            workstation_id: Uuid::new_v4(),
            status: TimerStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            efficiency: None,
            production_orders: None,
            production_logs: Vec::new(),
            production_timer_employees: vec![row],
        });
        assert_eq!(timer.team[0].name, employee_id.to_string());
    }
}
