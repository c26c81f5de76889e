//! Operational HTTP handlers that sit outside the resource groups

pub mod health;

pub use health::{health, ready, HealthResponse, ReadyResponse};
