//! Shared service plumbing for Soba processes: environment config, tracing,
//! health probes and HTTP middleware.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
