//! Service plumbing shared by leadops HTTP services: errors, health probes,
//! request ids, tracing and environment configuration.

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
