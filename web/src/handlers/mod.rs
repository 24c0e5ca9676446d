//! HTTP request handlers shared by every arena service.

pub mod health;

pub use health::{HealthProbe, health_check, readiness_check};
