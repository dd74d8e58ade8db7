//! HTTP handlers for the suggestion service.

pub mod health;
pub mod metrics;
pub mod suggest;
