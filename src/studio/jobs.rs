//! Tracker for background generation completions.
//!
//! Two-phase generations (character sheet, page illustration) return right
//! away and finish in a spawned task standing in for the provider webhook.
//! The tracker keeps one task per `(order, target)`: starting a new one for
//! the same target aborts the previous task, so a re-roll always wins.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::{OrderError, Result};

/// The artifact a generation produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationTarget {
    CharacterSheet,
    PageText { page: u32 },
    PagePrompt { page: u32 },
    PageImage { page: u32 },
}

impl fmt::Display for GenerationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CharacterSheet => write!(f, "character sheet"),
            Self::PageText { page } => write!(f, "page {} text", page),
            Self::PagePrompt { page } => write!(f, "page {} prompt", page),
            Self::PageImage { page } => write!(f, "page {} image", page),
        }
    }
}

type JobKey = (String, GenerationTarget);

struct RunningJob {
    id: Uuid,
    handle: JoinHandle<()>,
}

/// Handle to a background completion.
///
/// Dropping the ticket does not stop the job; `wait` only observes it.
#[derive(Debug)]
pub struct JobTicket {
    order_id: String,
    target: GenerationTarget,
    outcome: oneshot::Receiver<Result<()>>,
}

impl JobTicket {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn target(&self) -> &GenerationTarget {
        &self.target
    }

    /// Wait for the completion to be applied.
    ///
    /// Returns `Cancelled` if the job was aborted by a newer generation for
    /// the same target or by shutdown.
    pub async fn wait(self) -> Result<()> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(OrderError::Cancelled {
                order_id: self.order_id,
                target: self.target.to_string(),
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct GenerationJobs {
    running: Arc<Mutex<HashMap<JobKey, RunningJob>>>,
}

impl GenerationJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` as the job for `(order_id, target)`, aborting any job
    /// already running for the same pair.
    pub fn start<F>(&self, order_id: &str, target: GenerationTarget, work: F) -> JobTicket
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job_id = Uuid::new_v4();
        let key: JobKey = (order_id.to_string(), target.clone());

        // The map stays locked until the new job is registered, so its
        // cleanup can never run before the insert below.
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let registry = Arc::clone(&self.running);
        let cleanup_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = work.await;
            {
                let mut map = registry.lock().unwrap_or_else(PoisonError::into_inner);
                if map.get(&cleanup_key).is_some_and(|job| job.id == job_id) {
                    map.remove(&cleanup_key);
                }
            }
            let _ = tx.send(result);
        });

        if let Some(previous) = running.insert(key, RunningJob { id: job_id, handle }) {
            previous.handle.abort();
            tracing::debug!(order_id, target = %target, "superseded in-flight generation");
        }

        JobTicket {
            order_id: order_id.to_string(),
            target,
            outcome: rx,
        }
    }

    /// Abort the job for `(order_id, target)`. Returns whether one was running.
    pub fn cancel(&self, order_id: &str, target: &GenerationTarget) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.remove(&(order_id.to_string(), target.clone())) {
            Some(job) => {
                job.handle.abort();
                tracing::debug!(order_id, target = %target, "cancelled in-flight generation");
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Abort every running job.
    pub fn shutdown(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        for ((order_id, target), job) in running.drain() {
            tracing::info!(order_id = %order_id, target = %target, "aborting generation on shutdown");
            job.handle.abort();
        }
    }
}
