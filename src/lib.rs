//! Shop-floor production tracking for a textile plant ERP.
//!
//! Builds one [`model::WorkstationSnapshot`] per workstation from the row
//! store, keeps it fresh through a change feed and exposes the timer actions
//! operators take from the board.

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod progress;
pub mod roles;
pub mod store;
pub mod ui;
pub mod view;
