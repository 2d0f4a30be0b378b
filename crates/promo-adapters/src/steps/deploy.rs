use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use serde::{Deserialize, Serialize};

use crate::artifacts::{DeploymentArtifact, PromotionArtifact};
use crate::{DeploymentTrigger, PipelineParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployParams {
    pub deployment_name: String,
    pub deployment_namespace: String,
    pub model_name: String,
    pub serving_image: String,
}

impl Default for DeployParams {
    fn default() -> Self {
        let p = PipelineParams::default();
        Self { deployment_name: p.deployment_name,
               deployment_namespace: p.deployment_namespace,
               model_name: p.model_name,
               serving_image: p.serving_image }
    }
}

/// Rama "Deploy": sirve la versión vigente del modelo.
#[derive(Debug)]
pub struct DeployStep {
    trigger: DeploymentTrigger,
}

impl DeployStep {
    pub fn new(trigger: DeploymentTrigger) -> Self {
        Self { trigger }
    }
}

#[async_trait]
impl TypedStep for DeployStep {
    type Params = DeployParams;
    type Input = PromotionArtifact;
    type Output = DeploymentArtifact;

    fn id(&self) -> &str {
        super::DEPLOY_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    async fn run_typed(&self, _input: Option<PromotionArtifact>, p: DeployParams) -> StepRunResultTyped<DeploymentArtifact> {
        match self.trigger
                  .deploy(&p.deployment_name, &p.deployment_namespace, &p.model_name, &p.serving_image)
                  .await
        {
            Ok(d) => StepRunResultTyped::single(d.into()),
            Err(e) => StepRunResultTyped::Failure { error: e.into() },
        }
    }
}
