//! HTTP front door for the Cadence session orchestrator.

pub mod api;
pub mod metrics;
pub mod state;
