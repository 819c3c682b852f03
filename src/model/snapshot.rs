use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::entities::{ProductionOrder, ProductionTimer, Workstation};
use crate::error::ErrorClass;
use crate::progress::{self, EfficiencyTier};

/// Per-workstation view model, rebuilt from scratch on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkstationSnapshot {
    pub workstation: Workstation,
    pub active_timer: Option<ProductionTimer>,
    pub order: Option<ProductionOrder>,
    pub produced_total: u64,
    pub ordered_total: u64,
    pub progress_ratio: f64,
    pub efficiency_ratio: Option<f64>,
}

impl WorkstationSnapshot {
    fn idle(workstation: Workstation) -> Self {
        Self {
            workstation,
            active_timer: None,
            order: None,
            produced_total: 0,
            ordered_total: 0,
            progress_ratio: 0.0,
            efficiency_ratio: None,
        }
    }

    fn running(workstation: Workstation, timer: ProductionTimer) -> Self {
        let order = timer.order.clone();
        let produced_total = timer.produced_total;
        let ordered_total = order.as_ref().map_or(0, |o| o.total_quantity);
        Self {
            workstation,
            order,
            produced_total,
            ordered_total,
            progress_ratio: progress::progress_ratio(produced_total, ordered_total),
            efficiency_ratio: timer.efficiency,
            active_timer: Some(timer),
        }
    }

    pub fn workstation_id(&self) -> Uuid {
        self.workstation.id
    }

    pub fn is_running(&self) -> bool {
        self.active_timer.is_some()
    }

    pub fn progress_percent(&self) -> u32 {
        progress::progress_percent(self.progress_ratio)
    }

    pub fn efficiency_tier(&self) -> EfficiencyTier {
        progress::efficiency_tier(self.efficiency_ratio)
    }

    pub fn efficiency_percent(&self) -> Option<i64> {
        progress::efficiency_percent(self.efficiency_ratio)
    }

    pub fn remaining_units(&self) -> u64 {
        progress::remaining_units(self.produced_total, self.ordered_total)
    }

    pub fn throughput_per_hour(&self, now: DateTime<Utc>) -> Option<f64> {
        let timer = self.active_timer.as_ref()?;
        progress::throughput_per_hour(self.produced_total, timer.elapsed(now))
    }
}

/// Referential inconsistency tolerated while building snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataAnomaly {
    /// A second active timer for a workstation that already had one.
    DuplicateActiveTimer {
        workstation_id: Uuid,
        kept: Uuid,
        dropped: Uuid,
    },
    /// An active timer whose workstation is not in the workstation list.
    UnknownWorkstation { timer_id: Uuid, workstation_id: Uuid },
    /// An active timer that came back without its production order.
    MissingOrder { timer_id: Uuid },
    /// The same workstation id listed twice.
    DuplicateWorkstation { workstation_id: Uuid },
}

impl fmt::Display for DataAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateActiveTimer {
                workstation_id,
                kept,
                dropped,
            } => write!(
                f,
                "workstation {workstation_id} has several active timers; kept {kept}, dropped {dropped}"
            ),
            Self::UnknownWorkstation {
                timer_id,
                workstation_id,
            } => write!(
                f,
                "timer {timer_id} references unknown workstation {workstation_id}"
            ),
            Self::MissingOrder { timer_id } => {
                write!(f, "timer {timer_id} has no production order")
            }
            Self::DuplicateWorkstation { workstation_id } => {
                write!(f, "workstation {workstation_id} listed more than once")
            }
        }
    }
}

/// Snapshots plus the anomalies tolerated while producing them.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub snapshots: Vec<WorkstationSnapshot>,
    pub anomalies: Vec<DataAnomaly>,
}

impl BuildReport {
    /// Emits one warning per anomaly.
    pub fn log_anomalies(&self) {
        for anomaly in &self.anomalies {
            warn!(class = %ErrorClass::DataAnomaly, %anomaly, "shop-floor data anomaly");
        }
    }
}

/// Builds one snapshot per workstation, in workstation order.
///
/// The first active timer seen for a workstation wins. Timers pointing at
/// workstations missing from `workstations` are left out. Never fails.
pub fn build(workstations: Vec<Workstation>, timers: Vec<ProductionTimer>) -> BuildReport {
    let mut anomalies = Vec::new();
    let known: HashSet<Uuid> = workstations.iter().map(|w| w.id).collect();

    let mut by_workstation: HashMap<Uuid, ProductionTimer> = HashMap::new();
    for timer in timers {
        if !known.contains(&timer.workstation_id) {
            anomalies.push(DataAnomaly::UnknownWorkstation {
                timer_id: timer.id,
                workstation_id: timer.workstation_id,
            });
            continue;
        }
        if let Some(kept) = by_workstation.get(&timer.workstation_id) {
            anomalies.push(DataAnomaly::DuplicateActiveTimer {
                workstation_id: timer.workstation_id,
                kept: kept.id,
                dropped: timer.id,
            });
            continue;
        }
        if timer.order.is_none() {
            anomalies.push(DataAnomaly::MissingOrder { timer_id: timer.id });
        }
        by_workstation.insert(timer.workstation_id, timer);
    }

    let mut seen = HashSet::new();
    let mut snapshots = Vec::with_capacity(workstations.len());
    for workstation in workstations {
        if !seen.insert(workstation.id) {
            anomalies.push(DataAnomaly::DuplicateWorkstation {
                workstation_id: workstation.id,
            });
            continue;
        }
        let snapshot = match by_workstation.remove(&workstation.id) {
            Some(timer) => WorkstationSnapshot::running(workstation, timer),
            None => WorkstationSnapshot::idle(workstation),
        };
        snapshots.push(snapshot);
    }

    BuildReport {
        snapshots,
        anomalies,
    }
}
