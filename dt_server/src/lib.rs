//! HTTP server for daily group tournaments.
//!
//! Exposes the tournament operations over a JSON API and drives the
//! tournament lifecycle from a background clock.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod scheduler;
