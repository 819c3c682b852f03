use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of a mounted shop-floor view.
///
/// IDLE → LOADING → READY, READY → LOADING on every change, UNMOUNTED is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Unmounted,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Idle => write!(f, "IDLE"),
            ViewState::Loading => write!(f, "LOADING"),
            ViewState::Ready => write!(f, "READY"),
            ViewState::Unmounted => write!(f, "UNMOUNTED"),
        }
    }
}

/// Inputs that move the view between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// A refetch was issued (mount, change notification or manual refresh).
    FetchIssued,
    /// The authoritative fetch returned rows.
    FetchSucceeded,
    /// The authoritative fetch failed.
    FetchFailed,
    Unmount,
}

impl ViewState {
    /// Computes the state reached from `self` on `event`.
    ///
    /// - A failed fetch still lands in `Ready`: the last good snapshots stay
    ///   on screen.
    /// - `Unmounted` absorbs every event.
    /// - Results only arrive while loading; anywhere else they leave the state
    ///   unchanged.
    pub fn next(self, event: ViewEvent) -> ViewState {
        match (self, event) {
            (ViewState::Unmounted, _) => ViewState::Unmounted,
            (_, ViewEvent::Unmount) => ViewState::Unmounted,
            (_, ViewEvent::FetchIssued) => ViewState::Loading,
            (ViewState::Loading, ViewEvent::FetchSucceeded | ViewEvent::FetchFailed) => {
                ViewState::Ready
            }
            (state, ViewEvent::FetchSucceeded | ViewEvent::FetchFailed) => state,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ViewState::Unmounted
    }
}
