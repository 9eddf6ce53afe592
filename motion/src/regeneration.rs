//! Background rebuilding of arm trajectories from planner output.
//!
//! One worker task per engine. Jobs go through a `watch` channel so only the
//! newest path is ever pending; every submitted path takes a fresh generation
//! token, and the engine drops any result whose token has been overtaken.

use crate::engine::EngineHandle;
use crate::error::Result;
use crate::path::PlannedPath;
use crate::resample::{ResampleMode, WaypointResampler};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Job {
    token: u64,
    path: Arc<PlannedPath>,
}

pub struct RegenerationTask {
    jobs: watch::Sender<Option<Job>>,
    handle: EngineHandle,
    resampler: WaypointResampler,
}

impl RegenerationTask {
    /// Starts the worker on the current tokio runtime. It exits once this
    /// task handle is dropped.
    ///
    /// `settle` is how long a finished buffer waits for the planner to report
    /// execution before the ready flag is checked.
    pub fn spawn(handle: EngineHandle, mode: ResampleMode, settle: Duration) -> (Self, JoinHandle<()>) {
        let resampler = WaypointResampler::new(Arc::clone(handle.index()), mode);
        let (jobs, receiver) = watch::channel(None);
        let worker = tokio::spawn(run(receiver, handle.clone(), resampler.clone(), settle));
        (
            Self {
                jobs,
                handle,
                resampler,
            },
            worker,
        )
    }

    /// Queues `path` for resampling, replacing any job not yet started.
    /// Structurally invalid paths are rejected here without touching the
    /// generation counter.
    pub fn submit(&self, path: PlannedPath) -> Result<u64> {
        self.resampler.check(&path)?;
        let token = self.handle.next_generation();
        self.jobs.send_replace(Some(Job {
            token,
            path: Arc::new(path),
        }));
        Ok(token)
    }
}

async fn run(
    mut jobs: watch::Receiver<Option<Job>>,
    handle: EngineHandle,
    resampler: WaypointResampler,
    settle: Duration,
) {
    while jobs.changed().await.is_ok() {
        let Some(job) = jobs.borrow_and_update().clone() else {
            continue;
        };

        let base = handle.goal_snapshot();
        let dt = handle.interval();
        let worker = resampler.clone();
        let path = Arc::clone(&job.path);
        let buffer = match tokio::task::spawn_blocking(move || worker.resample(&path, &base, dt)).await {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(e)) => {
                warn!("Planned path rejected: {}", e);
                continue;
            }
            Err(e) => {
                error!("Resampling task failed: {}", e);
                continue;
            }
        };
        info!("Get joint trajectory ({} steps)", buffer.steps());

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let current = handle.generation();
        if job.token != current {
            debug!("Regeneration {} overtaken by {}", job.token, current);
            continue;
        }
        if !handle.take_ready() {
            info!("Planner is not executing, dropping trajectory {}", job.token);
            continue;
        }

        handle.post(job.token, buffer);
        info!("Send motion trajectory {}", job.token);
    }
}
