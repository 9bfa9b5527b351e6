//! Tracks the state of long-running import processing jobs.
//!
//! `POST /api/process_files` parses the uploaded data file in a blocking task
//! that can run for minutes on large uploads. While it runs, the task reports
//! row counts through an MPSC channel; this module folds those reports into a
//! shared map that `GET /api/status/{job_id}` reads.

use common::jobs::JobStatus;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

/// Thread-safe container for the status of all processing jobs.
///
/// Created once in `main.rs` and injected into the Actix application as
/// `web::Data`. Reads (the status endpoint) take the lock shared; only the
/// updater task and the job scheduler write.
#[derive(Clone)]
pub struct JobsState {
    /// Map from job id to its current status; the single source of truth.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Sender side of the update channel. Blocking workers use
    /// `blocking_send` on a clone of this to report progress without needing
    /// write access to the map.
    pub tx: mpsc::Sender<JobUpdate>,
}

impl JobsState {
    /// Builds the shared state together with the receiver the updater task
    /// must drain.
    pub fn channel(capacity: usize) -> (JobsState, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }
}

/// A status change for one job, sent by a background worker.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> JobUpdate {
        JobUpdate {
            job_id: job_id.into(),
            status,
        }
    }
}

/// Central updater task: spawned once at startup, folds `JobUpdate` messages
/// into the shared map until every sender is gone.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id.clone(), update.status);
    }
}
