//! Compute Engine adapter for the reconciliation engine
//!
//! This library provides:
//! - An authenticated REST client for the Compute Engine v1 API
//! - Long-running operation polling behind a rate limiter
//! - Resource clients implementing the engine's capability traits

pub mod client;
pub mod operation;
pub mod rate_limit;
pub mod resources;

pub use client::{ClientConfig, GceClient, DEFAULT_ENDPOINT};
pub use rate_limit::OperationRateLimiter;
pub use resources::{GceCloud, GceInstanceGroups, GceResource};
