use std::sync::Arc;

use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, StepSignal, TypedStep};
use promo_core::CoreEngineError;
use promo_domain::SharedWorkspace;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::artifacts::{JobArtifact, WorkspaceArtifact};
use crate::{JobRunner, PipelineParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainParams {
    pub config: String,
    pub context: String,
    pub tracker_endpoint: String,
}

impl Default for TrainParams {
    fn default() -> Self {
        let p = PipelineParams::default();
        Self { config: p.config,
               context: p.context,
               tracker_endpoint: p.tracker_endpoint }
    }
}

/// Envía el experimento y espera (poll acotado) a que termine. Config y
/// context se resuelven dentro del repositorio descargado.
#[derive(Debug)]
pub struct TrainStep {
    runner: JobRunner,
    workspace: Arc<SharedWorkspace>,
}

impl TrainStep {
    pub fn new(runner: JobRunner, workspace: Arc<SharedWorkspace>) -> Self {
        Self { runner, workspace }
    }
}

#[async_trait]
impl TypedStep for TrainStep {
    type Params = TrainParams;
    type Input = WorkspaceArtifact;
    type Output = JobArtifact;

    fn id(&self) -> &str {
        super::TRAIN_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    async fn run_typed(&self, input: Option<WorkspaceArtifact>, p: TrainParams) -> StepRunResultTyped<JobArtifact> {
        if input.is_none() {
            return StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs };
        }
        let config = self.workspace.resolve(&p.config);
        let context = self.workspace.resolve(&p.context);
        let job = match self.runner.submit(&p.tracker_endpoint, &config, &context).await {
            Ok(j) => j,
            Err(e) => return StepRunResultTyped::Failure { error: e.into() },
        };
        let submitted = StepSignal { signal: "job_submitted".into(),
                                     data: json!({ "job_id": job.as_str(), "endpoint": p.tracker_endpoint }) };
        match self.runner.await_completion(&job).await {
            Ok(state) => StepRunResultTyped::SuccessWithSignals { outputs: vec![JobArtifact { job_id: job.0,
                                                                                             state,
                                                                                             schema_version: 1 }],
                                                                  signals: vec![submitted] },
            Err(e) => StepRunResultTyped::Failure { error: e.into() },
        }
    }
}
