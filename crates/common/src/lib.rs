//! Shared configuration, error types, IDs, and observability primitives for veq crates.
//!
//! Architecture role:
//! - defines engine configuration passed across layers
//! - provides common [`VeqError`] / [`Result`] contracts
//! - hosts the per-session metrics registry
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]
//! - [`metrics`]

pub mod config;
pub mod error;
pub mod ids;
pub mod metrics;

pub use config::EngineConfig;
pub use error::{Result, VeqError};
pub use ids::QueryId;
pub use metrics::MetricsRegistry;
