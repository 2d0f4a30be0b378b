// promo-domain library entry point
pub mod deployment;
pub mod error;
pub mod job;
pub mod metrics;
pub mod model;
pub mod platform;
pub mod workspace;

pub use deployment::{Deployment, DeploymentRequest};
pub use error::PipelineError;
pub use job::{Checkpoint, JobId, JobSpec, JobState};
pub use metrics::{lookup_metric, MetricExtractor, MetricReading, SearcherObjective, METRIC_CONTAINER_KEYS};
pub use model::{Model, ModelLookup, ModelVersion, PromotionDecision, PromotionOutcome};
pub use platform::{JobPlatform, ModelRegistry, ServingPlatform, SourceFetcher};
pub use workspace::{RepoRef, SharedWorkspace, REPO_DIR_NAME};
