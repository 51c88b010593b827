//! Job context - shared state for one resource's pipeline run.

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::transform::Transformer;
use crate::types::{Event, ResourceState};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared context for a single job, reducing parameter passing between stages.
pub(crate) struct JobContext {
    pub(crate) url: String,
    /// Final artifact location
    pub(crate) local_path: PathBuf,
    pub(crate) total_size_bytes: u64,
    pub(crate) db: Arc<Database>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) http: reqwest::Client,
    pub(crate) transformer: Arc<dyn Transformer>,
}

impl JobContext {
    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Persist `from -> to`; the record not being in `from` is a consistency error
    pub(super) async fn transition(&self, from: ResourceState, to: ResourceState) -> Result<()> {
        if !self.db.transition_state(&self.url, from, to).await? {
            return Err(Error::Consistency(format!(
                "{} was not in state {} when moving to {}",
                self.url, from, to
            )));
        }

        tracing::info!(url = %self.url, from = %from, to = %to, "Resource state changed");
        Ok(())
    }

    /// Record the failure on the resource and emit the failure event.
    pub(super) async fn mark_failed(&self, error: &Error) {
        let message = error.to_string();

        match self.db.mark_error(&self.url, &message).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(url = %self.url, "Failed job left no active record to mark")
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Failed to record job failure")
            }
        }

        self.emit(Event::Failed {
            url: self.url.clone(),
            error: message,
        });
    }
}
