//! Quote pricing and availability engine for a vacation-rental booking site.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
