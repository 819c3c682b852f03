//! Shop-floor actions behind the workstation cards.
//!
//! [`TimerActions`] is the write boundary: each action validates against the
//! current timer row and then issues a single-row write. The view never
//! patches its snapshots after an action; the resulting change notification
//! triggers a full refetch.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::WriteError;
use crate::model::{NewTimer, ProductionLog, ProductionTimer, TimerPatch, TimerStatus};
use crate::store::RowStore;

/// Largest quantity accepted in a single production log entry.
const MAX_UNITS_PER_LOG: i64 = u32::MAX as i64;

pub struct TimerActions<'a, S: RowStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RowStore + ?Sized> TimerActions<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn timer(&self, id: Uuid) -> Result<ProductionTimer, WriteError> {
        self.store
            .fetch_timer(id)
            .await?
            .ok_or(WriteError::TimerNotFound(id))
    }

    async fn move_to(
        &self,
        id: Uuid,
        next: TimerStatus,
        action: &'static str,
    ) -> Result<(), WriteError> {
        let timer = self.timer(id).await?;
        if !timer.status.can_transition_to(next) {
            return Err(WriteError::InvalidTransition {
                from: timer.status,
                action,
            });
        }
        let patch = TimerPatch {
            status: next,
            end_time: (next == TimerStatus::Stopped).then(Utc::now),
        };
        self.store.update_timer(id, &patch).await?;
        info!(timer = %id, from = timer.status.as_str(), to = next.as_str(), "timer {action}");
        Ok(())
    }

    /// Starts a timer for `order_id` on a workstation with no active timer.
    pub async fn start(&self, workstation_id: Uuid, order_id: Uuid) -> Result<(), WriteError> {
        let active = self.store.list_active_timers().await?;
        if let Some(existing) = active.iter().find(|t| t.workstation_id == workstation_id) {
            return Err(WriteError::WorkstationBusy {
                workstation_id,
                timer_id: existing.id,
            });
        }
        let timer = NewTimer {
            workstation_id,
            production_order_id: order_id,
            status: TimerStatus::InProgress,
            start_time: Utc::now(),
        };
        self.store.insert_timer(&timer).await?;
        info!(workstation = %workstation_id, order = %order_id, "timer started");
        Ok(())
    }

    pub async fn pause(&self, timer_id: Uuid) -> Result<(), WriteError> {
        self.move_to(timer_id, TimerStatus::Paused, "pause").await
    }

    pub async fn resume(&self, timer_id: Uuid) -> Result<(), WriteError> {
        self.move_to(timer_id, TimerStatus::InProgress, "resume").await
    }

    pub async fn stop(&self, timer_id: Uuid) -> Result<(), WriteError> {
        self.move_to(timer_id, TimerStatus::Stopped, "stop").await
    }

    /// Appends a production log entry of `units` to an active timer.
    pub async fn log_progress(&self, timer_id: Uuid, units: i64) -> Result<(), WriteError> {
        if units <= 0 || units > MAX_UNITS_PER_LOG {
            return Err(WriteError::InvalidUnits(units));
        }
        let timer = self.timer(timer_id).await?;
        if !timer.is_active() {
            return Err(WriteError::TimerNotActive {
                id: timer_id,
                status: timer.status,
            });
        }
        let log = ProductionLog {
            timer_id,
            produced_units: units as u32,
            logged_at: Utc::now(),
        };
        self.store.insert_log(&log).await?;
        info!(timer = %timer_id, units, "production logged");
        Ok(())
    }

    pub async fn add_team_member(
        &self,
        timer_id: Uuid,
        employee_id: Uuid,
    ) -> Result<(), WriteError> {
        let timer = self.timer(timer_id).await?;
        if !timer.is_active() {
            return Err(WriteError::TimerNotActive {
                id: timer_id,
                status: timer.status,
            });
        }
        self.store.add_team_member(timer_id, employee_id).await?;
        info!(timer = %timer_id, employee = %employee_id, "team member added");
        Ok(())
    }

    /// Removes an employee from a timer's team. A timer with logged production
    /// keeps at least one member.
    pub async fn remove_team_member(
        &self,
        timer_id: Uuid,
        employee_id: Uuid,
    ) -> Result<(), WriteError> {
        let timer = self.timer(timer_id).await?;
        if !timer.has_member(employee_id) {
            return Err(WriteError::NotOnTeam {
                timer_id,
                employee_id,
            });
        }
        if timer.has_logged_production() && timer.team.len() <= 1 {
            return Err(WriteError::LastTeamMember { timer_id });
        }
        self.store.remove_team_member(timer_id, employee_id).await?;
        info!(timer = %timer_id, employee = %employee_id, "team member removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Floor {
        store: MemoryStore,
        workstation: Uuid,
        order: Uuid,
        timer: Uuid,
        ana: Uuid,
    }

    async fn floor() -> Floor {
        let store = MemoryStore::new();
        let workstation = store.add_workstation("Telar 1", Some("Tejido")).id;
        let order = store.add_order("OP-1", 100, "Jersey").id;
        let ana = store.add_employee("Ana");
        let timer = store.start_timer_row(workstation, order);
        store.add_team_member(timer, ana).await.unwrap();
        Floor {
            store,
            workstation,
            order,
            timer,
            ana,
        }
    }

    async fn status(f: &Floor) -> TimerStatus {
        f.store.fetch_timer(f.timer).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn pause_resume_stop() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);

        actions.pause(f.timer).await.unwrap();
        assert_eq!(status(&f).await, TimerStatus::Paused);
        actions.resume(f.timer).await.unwrap();
        assert_eq!(status(&f).await, TimerStatus::InProgress);
        actions.stop(f.timer).await.unwrap();
        assert_eq!(status(&f).await, TimerStatus::Stopped);

        let stopped = f.store.fetch_timer(f.timer).await.unwrap().unwrap();
        assert!(stopped.end_time.is_some());
    }

    #[tokio::test]
    async fn stopped_timer_cannot_be_paused() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);
        actions.stop(f.timer).await.unwrap();

        let err = actions.pause(f.timer).await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::InvalidTransition {
                from: TimerStatus::Stopped,
                action: "pause"
            }
        ));
    }

    #[tokio::test]
    async fn resume_requires_paused() {
        let f = floor().await;
        let err = TimerActions::new(&f.store).resume(f.timer).await.unwrap_err();
        assert!(matches!(err, WriteError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn start_rejects_busy_workstation() {
        let f = floor().await;
        let err = TimerActions::new(&f.store)
            .start(f.workstation, f.order)
            .await
            .unwrap_err();
        match err {
            WriteError::WorkstationBusy {
                workstation_id,
                timer_id,
            } => {
                assert_eq!(workstation_id, f.workstation);
                assert_eq!(timer_id, f.timer);
            }
            other => panic!("expected WorkstationBusy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_after_stop_creates_new_timer() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);
        actions.stop(f.timer).await.unwrap();

        actions.start(f.workstation, f.order).await.unwrap();

        let active = f.store.list_active_timers().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_ne!(active[0].id, f.timer);
        assert_eq!(active[0].status, TimerStatus::InProgress);
    }

    #[tokio::test]
    async fn log_progress_validates_units() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);

        for bad in [0, -3, MAX_UNITS_PER_LOG + 1] {
            let err = actions.log_progress(f.timer, bad).await.unwrap_err();
            assert!(matches!(err, WriteError::InvalidUnits(u) if u == bad));
        }

        actions.log_progress(f.timer, 12).await.unwrap();
        let timer = f.store.fetch_timer(f.timer).await.unwrap().unwrap();
        assert_eq!(timer.produced_total, 12);
    }

    #[tokio::test]
    async fn log_progress_needs_active_timer() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);
        actions.stop(f.timer).await.unwrap();

        let err = actions.log_progress(f.timer, 5).await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::TimerNotActive {
                status: TimerStatus::Stopped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_timer_is_reported() {
        let f = floor().await;
        let ghost = Uuid::new_v4();
        let err = TimerActions::new(&f.store).pause(ghost).await.unwrap_err();
        assert!(matches!(err, WriteError::TimerNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn last_member_stays_once_production_is_logged() {
        let f = floor().await;
        let actions = TimerActions::new(&f.store);
        actions.log_progress(f.timer, 8).await.unwrap();

        let err = actions.remove_team_member(f.timer, f.ana).await.unwrap_err();
        assert!(matches!(err, WriteError::LastTeamMember { timer_id } if timer_id == f.timer));

        let luis = f.store.add_employee("Luis");
        actions.add_team_member(f.timer, luis).await.unwrap();
        actions.remove_team_member(f.timer, f.ana).await.unwrap();

        let timer = f.store.fetch_timer(f.timer).await.unwrap().unwrap();
        assert_eq!(timer.team.len(), 1);
        assert_eq!(timer.team[0].name, "Luis");
    }

    #[tokio::test]
    async fn last_member_may_leave_before_any_production() {
        let f = floor().await;
        TimerActions::new(&f.store)
            .remove_team_member(f.timer, f.ana)
            .await
            .unwrap();
        let timer = f.store.fetch_timer(f.timer).await.unwrap().unwrap();
        assert!(timer.team.is_empty());
    }

    #[tokio::test]
    async fn removing_a_stranger_fails() {
        let f = floor().await;
        let stranger = Uuid::new_v4();
        let err = TimerActions::new(&f.store)
            .remove_team_member(f.timer, stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::NotOnTeam { .. }));
    }
}
