use std::time::Duration;

use promo_core::CoreEngineError;
use thiserror::Error;

use crate::JobId;

/// Errores del pipeline de entrenamiento y promoción.
///
/// Todos son fatales para el step que los produce; ninguno se reintenta
/// localmente. Que un candidato pierda la comparación no es un error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("job submission rejected: {0}")]
    Submission(String),
    #[error("job {job_id} finished in failed state")]
    JobFailed { job_id: JobId },
    #[error("job {job_id} did not finish within {waited:?}")]
    JobWaitTimeout { job_id: JobId, waited: Duration },
    #[error("job status unavailable: {0}")]
    JobStatusUnavailable(String),
    #[error("metric '{metric}' not found in checkpoint {checkpoint}")]
    MetricNotFound { metric: String, checkpoint: String },
    #[error("invalid searcher config: {0}")]
    InvalidSearcherConfig(String),
    #[error("model registry unavailable: {0}")]
    ModelRegistryUnavailable(String),
    #[error("deployment rejected: {0}")]
    Deployment(String),
    #[error("workspace: {0}")]
    Workspace(String),
}

impl PipelineError {
    /// Nombre estable del tipo de error, usado como `kind` en el event log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FetchError",
            Self::Submission(_) => "SubmissionError",
            Self::JobFailed { .. } => "JobFailedError",
            Self::JobWaitTimeout { .. } => "JobWaitTimeout",
            Self::JobStatusUnavailable(_) => "JobStatusUnavailable",
            Self::MetricNotFound { .. } => "MetricNotFoundError",
            Self::InvalidSearcherConfig(_) => "InvalidSearcherConfig",
            Self::ModelRegistryUnavailable(_) => "ModelRegistryUnavailable",
            Self::Deployment(_) => "DeploymentError",
            Self::Workspace(_) => "WorkspaceError",
        }
    }
}

impl From<PipelineError> for CoreEngineError {
    fn from(e: PipelineError) -> Self {
        CoreEngineError::step(e.kind(), e.to_string())
    }
}
