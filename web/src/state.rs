//! Application state for Axum handlers.

use relief_desk_core::{ReleaseEnvironment, ReleaseServices};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via `Arc`) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Scheduler, reporter and the configuration they were built from
    pub services: Arc<ReleaseServices>,
    /// Stores and clock, for the read-only capacity view
    pub env: ReleaseEnvironment,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(env: ReleaseEnvironment, services: ReleaseServices) -> Self {
        Self {
            services: Arc::new(services),
            env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
