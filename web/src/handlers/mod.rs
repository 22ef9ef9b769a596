//! HTTP request handlers.

pub mod capacity;
pub mod coverage;
pub mod health;
pub mod queue;
pub mod releases;

pub use health::health_check;
