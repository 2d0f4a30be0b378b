//! `JobRunner`: envío de jobs y espera acotada.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use promo_domain::{JobId, JobPlatform, JobSpec, JobState, PipelineError};
use tokio::time::Instant;

/// Un intervalo nulo convertiría la espera en un busy loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Intervalo de poll y espera máxima de `await_completion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(5),
               max_wait: Duration::from_secs(24 * 60 * 60) }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    platform: Arc<dyn JobPlatform>,
    poll: PollPolicy,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner").field("poll", &self.poll).finish_non_exhaustive()
    }
}

impl JobRunner {
    /// El intervalo se acota a `MIN_POLL_INTERVAL`.
    pub fn new(platform: Arc<dyn JobPlatform>, poll: PollPolicy) -> Self {
        let poll = PollPolicy { interval: poll.interval.max(MIN_POLL_INTERVAL),
                                ..poll };
        Self { platform, poll }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub async fn submit(&self, endpoint: &str, config: &Path, context: &Path) -> Result<JobId, PipelineError> {
        let spec = JobSpec { endpoint: endpoint.to_string(),
                             config_path: config.to_path_buf(),
                             context_path: context.to_path_buf() };
        let job = self.platform.submit(&spec).await?;
        info!("submitted job {job} to {endpoint}");
        Ok(job)
    }

    /// Poll hasta estado terminal. `Failed` es error y no se reintenta;
    /// superar `max_wait` es `JobWaitTimeout`.
    pub async fn await_completion(&self, job: &JobId) -> Result<JobState, PipelineError> {
        let start = Instant::now();
        loop {
            let state = self.platform.state(job).await?;
            match state {
                JobState::Completed => {
                    info!("job {job} completed");
                    return Ok(state);
                }
                JobState::Failed => return Err(PipelineError::JobFailed { job_id: job.clone() }),
                JobState::Created | JobState::Running => {}
            }
            let waited = start.elapsed();
            if waited >= self.poll.max_wait {
                return Err(PipelineError::JobWaitTimeout { job_id: job.clone(),
                                                           waited });
            }
            debug!("job {job} is {state:?}, next poll in {:?}", self.poll.interval);
            tokio::time::sleep(self.poll.interval.min(self.poll.max_wait - waited)).await;
        }
    }
}
