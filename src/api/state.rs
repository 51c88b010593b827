//! Application state for the API server

use crate::{CogFetcher, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The fetcher serving registrations and status queries
    pub fetcher: Arc<CogFetcher>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(fetcher: Arc<CogFetcher>, config: Arc<Config>) -> Self {
        Self { fetcher, config }
    }
}
