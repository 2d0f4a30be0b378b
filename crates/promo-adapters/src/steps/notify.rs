use async_trait::async_trait;
use log::info;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use promo_core::CoreEngineError;
use serde::{Deserialize, Serialize};

use crate::artifacts::{NotificationArtifact, PromotionArtifact};
use crate::NOT_DEPLOYED_MESSAGE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyParams {
    pub message: String,
}

impl Default for NotifyParams {
    fn default() -> Self {
        Self { message: NOT_DEPLOYED_MESSAGE.into() }
    }
}

/// Rama "No-Deploy": deja constancia explícita de que no hubo deployment.
#[derive(Debug, Default)]
pub struct NoDeployStep;

#[async_trait]
impl TypedStep for NoDeployStep {
    type Params = NotifyParams;
    type Input = PromotionArtifact;
    type Output = NotificationArtifact;

    fn id(&self) -> &str {
        super::NO_DEPLOY_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    async fn run_typed(&self, input: Option<PromotionArtifact>, p: NotifyParams) -> StepRunResultTyped<NotificationArtifact> {
        let Some(decision) = input else {
            return StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs };
        };
        info!("{}", p.message);
        StepRunResultTyped::single(NotificationArtifact { message: p.message,
                                                          model_name: decision.model_name,
                                                          candidate_metric: decision.candidate_metric,
                                                          previous_metric: decision.previous_metric,
                                                          schema_version: 1 })
    }
}
