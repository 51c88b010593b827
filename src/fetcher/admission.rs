//! Job admission - single-flight per resource key plus a concurrency cap.

use crate::error::{Error, Result};
use crate::types::ResourceState;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Interval between checks while waiting for in-flight jobs to drain
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An admitted job: when it was admitted and the artifact it will write
struct Admission {
    artifact: PathBuf,
    admitted_at: Instant,
}

type InFlight = Arc<Mutex<HashMap<String, Admission>>>;

/// Job queue keyed by resource identity
///
/// A key is in flight from [`reserve`](Self::reserve) until the [`JobSlot`] it
/// returned is dropped. While a key is in flight no second slot is handed out
/// for it, nor for any other key targeting the same artifact path.
/// At most `max_concurrent` spawned jobs run at once; the rest wait for a permit.
#[derive(Clone)]
pub(crate) struct JobQueue {
    in_flight: InFlight,
    concurrency: Arc<Semaphore>,
    max_concurrent: usize,
    accepting: Arc<AtomicBool>,
}

impl JobQueue {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Claim `key` for a new job writing to `artifact`
    ///
    /// Fails with [`Error::ShuttingDown`] once the queue is closed, and with
    /// [`Error::RegistrationConflict`] while another job holds the key or the
    /// artifact path. The conflict names the key holding the slot and reports
    /// `downloading`; callers with access to the record refine the state.
    pub(crate) fn reserve(&self, key: &str, artifact: &Path) -> Result<JobSlot> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut in_flight = lock(&self.in_flight);
        let holder = if in_flight.contains_key(key) {
            Some(key.to_string())
        } else {
            in_flight
                .iter()
                .find(|(_, admission)| admission.artifact.as_path() == artifact)
                .map(|(owner, _)| owner.clone())
        };
        if let Some(holder) = holder {
            return Err(Error::RegistrationConflict {
                url: holder,
                state: ResourceState::Downloading,
            });
        }
        in_flight.insert(
            key.to_string(),
            Admission {
                artifact: artifact.to_path_buf(),
                admitted_at: Instant::now(),
            },
        );

        Ok(JobSlot {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
            concurrency: Arc::clone(&self.concurrency),
        })
    }

    pub(crate) fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Stop handing out new slots; jobs already admitted keep running
    pub(crate) fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Wait until no key is in flight and every spawned job has returned
    ///
    /// A job may release its key before it finishes its last write, so the
    /// permits are checked as well.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let active_count = self.in_flight_count();
            let running = self.max_concurrent - self.concurrency.available_permits();
            if active_count == 0 && running == 0 {
                return;
            }

            tracing::debug!(active_count, running, "Waiting for in-flight jobs to finish");
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }
}

/// Claim on a resource key, released on drop
pub(crate) struct JobSlot {
    key: String,
    in_flight: InFlight,
    concurrency: Arc<Semaphore>,
}

impl JobSlot {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Run `job` on the runtime once a concurrency permit is available
    ///
    /// The job owns the slot: the key stays in flight until the job drops it or
    /// returns. The permit is held until the job returns.
    pub(crate) fn spawn<F, Fut>(self, job: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(JobSlot) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let _permit = match Arc::clone(&self.concurrency).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(url = %self.key, "Job queue closed before job could start");
                    return;
                }
            };

            job(self).await;
        })
    }
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        if let Some(admission) = lock(&self.in_flight).remove(&self.key) {
            tracing::debug!(
                url = %self.key,
                artifact = %admission.artifact.display(),
                elapsed_ms = admission.admitted_at.elapsed().as_millis() as u64,
                "Released job slot"
            );
        }
    }
}

// Map updates never panic mid-way, so a poisoned map is still consistent
fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, Admission>> {
    in_flight.lock().unwrap_or_else(|e| e.into_inner())
}
