use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::model::TimerStatus;
use crate::roles::{Module, Role};
pub use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ShopfloorError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Role {role} may not open the {module} module")]
    AccessDenied { role: Role, module: Module },

    #[error("Row store error: {0}")]
    Store(#[from] StoreError),

    #[error("Write rejected: {0}")]
    Write(#[from] WriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Reasons a shop-floor action is refused or fails.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Produced units must be a positive integer, got {0}")]
    InvalidUnits(i64),

    #[error("Timer {0} not found")]
    TimerNotFound(Uuid),

    #[error("Timer {id} is {status}, not active")]
    TimerNotActive { id: Uuid, status: TimerStatus },

    #[error("Cannot {action} a timer that is {from}")]
    InvalidTransition {
        from: TimerStatus,
        action: &'static str,
    },

    #[error("Workstation {workstation_id} already has active timer {timer_id}")]
    WorkstationBusy { workstation_id: Uuid, timer_id: Uuid },

    #[error("Employee {employee_id} is not on timer {timer_id}")]
    NotOnTeam { timer_id: Uuid, employee_id: Uuid },

    #[error("Timer {timer_id} has logged production and needs at least one team member")]
    LastTeamMember { timer_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a failure is handled by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// A query or subscription failed; last-good data stays on screen.
    TransientFetch,
    /// Rows disagree with each other; tolerated and logged only.
    DataAnomaly,
    /// A user action failed; reported where the action was taken.
    WriteFailure,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::TransientFetch => write!(f, "TransientFetch"),
            ErrorClass::DataAnomaly => write!(f, "DataAnomaly"),
            ErrorClass::WriteFailure => write!(f, "WriteFailure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_display() {
        let err = WriteError::InvalidTransition {
            from: TimerStatus::Stopped,
            action: "pause",
        };
        assert_eq!(err.to_string(), "Cannot pause a timer that is STOPPED");
        assert_eq!(
            WriteError::InvalidUnits(0).to_string(),
            "Produced units must be a positive integer, got 0"
        );
    }

    #[test]
    fn store_errors_pass_through_writes() {
        let err = WriteError::from(StoreError::Unavailable("offline".into()));
        assert_eq!(err.to_string(), "row store unavailable: offline");
        let top = ShopfloorError::from(err);
        assert_eq!(top.to_string(), "Write rejected: row store unavailable: offline");
    }

    #[test]
    fn access_denied_names_role_and_module() {
        let err = ShopfloorError::AccessDenied {
            role: Role::Gerencia,
            module: Module::ShopFloor,
        };
        assert_eq!(
            err.to_string(),
            "Role Gerencia may not open the Shop floor module"
        );
    }

    #[test]
    fn error_class_display() {
        assert_eq!(ErrorClass::TransientFetch.to_string(), "TransientFetch");
        assert_eq!(ErrorClass::WriteFailure.to_string(), "WriteFailure");
    }
}
