use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A machine or bench on the shop floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    pub id: Uuid,
    pub name: String,
    /// Name of the process the workstation is assigned to (weaving, dyeing...).
    pub process_name: Option<String>,
}

/// Lifecycle status of a production timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Pending,
    InProgress,
    Paused,
    Stopped,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// A timer is active until it is stopped, paused timers included.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }

    /// Whether a timer in this status may move to `next`.
    pub fn can_transition_to(&self, next: TimerStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Paused)
                | (Self::Paused, Self::InProgress)
                | (Self::Pending, Self::Stopped)
                | (Self::InProgress, Self::Stopped)
                | (Self::Paused, Self::Stopped)
        )
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::InProgress => write!(f, "IN PROGRESS"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl FromStr for TimerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid timer status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: Uuid,
    /// Human-facing order code, e.g. `OP-2024-0012`.
    pub code: String,
    pub total_quantity: u64,
    pub status: String,
    pub product: Option<Product>,
}

/// An employee assigned to a running timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub employee_id: Uuid,
    pub name: String,
}

/// A production timer pre-joined with its order, team and logged output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTimer {
    pub id: Uuid,
    pub workstation_id: Uuid,
    pub status: TimerStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub order: Option<ProductionOrder>,
    /// Sum of `produced_units` over every log attributed to this timer.
    pub produced_total: u64,
    /// Rolling efficiency computed by the backend; read-only here.
    pub efficiency: Option<f64>,
    pub team: Vec<TeamMember>,
}

impl ProductionTimer {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Wall-clock time since the timer started, up to its end time if stopped.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).max(Duration::zero())
    }

    pub fn has_logged_production(&self) -> bool {
        self.produced_total > 0
    }

    pub fn has_member(&self, employee_id: Uuid) -> bool {
        self.team.iter().any(|m| m.employee_id == employee_id)
    }
}

/// Append-only production entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLog {
    pub timer_id: Uuid,
    pub produced_units: u32,
    pub logged_at: DateTime<Utc>,
}

/// Row inserted when a timer is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimer {
    pub workstation_id: Uuid,
    pub production_order_id: Uuid,
    pub status: TimerStatus,
    pub start_time: DateTime<Utc>,
}

/// Partial update applied to a timer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerPatch {
    pub status: TimerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}
