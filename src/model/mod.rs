mod entities;
mod snapshot;

pub use entities::{
    NewTimer, Product, ProductionLog, ProductionOrder, ProductionTimer, TeamMember, TimerPatch,
    TimerStatus, Workstation,
};
pub use snapshot::{BuildReport, DataAnomaly, WorkstationSnapshot, build};
