//! Presentation state for the dashboard and the monthly features table.
//!
//! Views own their state and never perform I/O directly; the `load_*` and
//! `submit_*` helpers drive them against a [`crate::api::DashboardApi`].

pub mod dashboard;
pub mod format;
pub mod table;

pub use dashboard::{DashboardView, FormError, PredictionForm, PredictionState, Section};
pub use table::{FetchOutcome, FetchTicket, MonthlyTableView, TableStatus};
