use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::state::{ViewEvent, ViewState};
use crate::error::ErrorClass;
use crate::feed::{ChangeEvent, ChangeFeed, Subscription, SubscriptionSpec};
use crate::model::{self, DataAnomaly, ProductionTimer, Workstation, WorkstationSnapshot};
use crate::store::{RowStore, StoreError};

/// Notices kept for the presenter before the oldest are dropped.
const MAX_NOTICES: usize = 20;

/// Past states kept for inspection; the oldest are dropped first.
const MAX_HISTORY: usize = 64;

/// Sequence number of an issued fetch. The highest issued ticket is the only
/// one whose result is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// The pair of query results one fetch captured.
#[derive(Debug, Clone, Default)]
pub struct FetchedRows {
    pub workstations: Vec<Workstation>,
    pub timers: Vec<ProductionTimer>,
}

/// What [`ViewController::apply`] did with a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New snapshots are visible.
    Rendered,
    /// The fetch failed; the previous snapshots are still visible.
    Failed,
    /// A newer fetch was issued after this one; result dropped.
    Superseded,
    /// The view is unmounted; result dropped.
    Discarded,
}

/// Non-blocking message for the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub class: ErrorClass,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Owns the fetch-and-subscribe lifecycle of one shop-floor view.
///
/// Every change notification issues a full refetch. Fetches may overlap; the
/// result of the most recently issued one wins and older results are dropped
/// whenever they arrive.
#[derive(Debug)]
pub struct ViewController {
    state: ViewState,
    state_history: VecDeque<ViewState>,
    issued: u64,
    snapshots: Vec<WorkstationSnapshot>,
    anomalies: Vec<DataAnomaly>,
    notices: VecDeque<Notice>,
    subscription: Option<Subscription>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            state: ViewState::Idle,
            state_history: VecDeque::new(),
            issued: 0,
            snapshots: Vec::new(),
            anomalies: Vec::new(),
            notices: VecDeque::new(),
            subscription: None,
            refreshed_at: None,
        }
    }

    /// Creates a controller subscribed to the shop-floor tables of `feed`.
    pub fn mount(feed: &impl ChangeFeed) -> Result<Self, StoreError> {
        let mut controller = Self::new();
        controller.attach(feed.subscribe(SubscriptionSpec::shop_floor())?);
        Ok(controller)
    }

    /// Hands a subscription to the controller. Released straight away if the
    /// view is already unmounted.
    pub fn attach(&mut self, subscription: Subscription) {
        if self.state.is_terminal() {
            subscription.release();
            return;
        }
        if let Some(previous) = self.subscription.replace(subscription) {
            previous.release();
        }
    }

    fn transition(&mut self, event: ViewEvent) {
        let next = self.state.next(event);
        if next != self.state {
            if self.state_history.len() == MAX_HISTORY {
                self.state_history.pop_front();
            }
            self.state_history.push_back(self.state);
            self.state = next;
        }
    }

    /// Starts a new fetch. Returns `None` once unmounted.
    pub fn issue_fetch(&mut self) -> Option<FetchTicket> {
        if self.state.is_terminal() {
            return None;
        }
        self.issued += 1;
        self.transition(ViewEvent::FetchIssued);
        debug!(ticket = self.issued, "fetch issued");
        Some(FetchTicket(self.issued))
    }

    /// Applies the result of the fetch identified by `ticket`.
    pub fn apply(
        &mut self,
        ticket: FetchTicket,
        result: Result<FetchedRows, StoreError>,
    ) -> Applied {
        if self.state.is_terminal() {
            debug!(ticket = ticket.0, "result after unmount dropped");
            return Applied::Discarded;
        }
        if ticket.0 != self.issued {
            debug!(ticket = ticket.0, latest = self.issued, "superseded result dropped");
            return Applied::Superseded;
        }

        match result {
            Ok(rows) => {
                let report = model::build(rows.workstations, rows.timers);
                report.log_anomalies();
                info!(
                    ticket = ticket.0,
                    workstations = report.snapshots.len(),
                    running = report.snapshots.iter().filter(|s| s.is_running()).count(),
                    "snapshots rebuilt"
                );
                self.snapshots = report.snapshots;
                self.anomalies = report.anomalies;
                self.refreshed_at = Some(Utc::now());
                self.notices.retain(|n| n.class != ErrorClass::TransientFetch);
                self.transition(ViewEvent::FetchSucceeded);
                Applied::Rendered
            }
            Err(e) => {
                warn!(ticket = ticket.0, error = %e, "refresh failed, keeping last good snapshots");
                self.push_notice(Notice {
                    class: ErrorClass::TransientFetch,
                    message: format!("Could not refresh the shop floor: {e}"),
                    at: Utc::now(),
                });
                self.transition(ViewEvent::FetchFailed);
                Applied::Failed
            }
        }
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    /// Moves to the terminal state and releases the subscription. Returns
    /// `false` if the view was already unmounted.
    pub fn unmount(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        self.transition(ViewEvent::Unmount);
        info!("view unmounted");
        true
    }

    /// Waits for the next change notification. Never resolves without a
    /// subscription; returns `None` once the feed has closed.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        let event = subscription.next().await;
        if event.is_none() {
            warn!("change feed closed; view will no longer refresh on its own");
            self.subscription = None;
        }
        event
    }

    /// Issues a fetch, waits for it and applies it. Used for the initial load
    /// and for manual refreshes.
    pub async fn refresh<S: RowStore + ?Sized>(&mut self, store: &S) -> Applied {
        let Some(ticket) = self.issue_fetch() else {
            return Applied::Discarded;
        };
        let (ticket, result) = fetch_rows(store, ticket).await;
        self.apply(ticket, result)
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Most recent states left behind, oldest first.
    pub fn state_history(&self) -> Vec<ViewState> {
        self.state_history.iter().copied().collect()
    }

    pub fn snapshots(&self) -> &[WorkstationSnapshot] {
        &self.snapshots
    }

    pub fn anomalies(&self) -> &[DataAnomaly] {
        &self.anomalies
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

/// Runs both shop-floor queries concurrently for one ticket.
pub async fn fetch_rows<S: RowStore + ?Sized>(
    store: &S,
    ticket: FetchTicket,
) -> (FetchTicket, Result<FetchedRows, StoreError>) {
    let result = tokio::try_join!(store.list_workstations(), store.list_active_timers())
        .map(|(workstations, timers)| FetchedRows {
            workstations,
            timers,
        });
    (ticket, result)
}
