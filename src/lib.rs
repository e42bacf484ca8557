//! Terminal client for the credit card spending analytics backend.
//!
//! - [`http`] issues requests and folds every failure into [`http::ApiError`]
//! - [`api`] wraps the backend endpoints and normalizes their loose payloads
//! - [`views`] holds the dashboard and monthly-table state machines
//! - [`cli`] renders views for the `ccdash` binary
//! - [`config`] and [`telemetry`] cover layered settings and the request log

pub mod api;
pub mod cli;
pub mod config;
pub mod http;
pub mod telemetry;
pub mod views;
