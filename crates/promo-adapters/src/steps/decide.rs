use std::sync::Arc;

use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use promo_core::CoreEngineError;
use promo_domain::MetricReading;
use promo_policies::PromotionDecider;
use serde::{Deserialize, Serialize};

use crate::artifacts::{MetricArtifact, PromotionArtifact};
use crate::PipelineParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideParams {
    pub model_name: String,
}

impl Default for DecideParams {
    fn default() -> Self {
        Self { model_name: PipelineParams::default().model_name }
    }
}

/// Gate del pipeline: su output `promoted` elige entre deploy y no-deploy.
#[derive(Debug)]
pub struct DecideStep {
    decider: Arc<PromotionDecider>,
}

impl DecideStep {
    pub fn new(decider: Arc<PromotionDecider>) -> Self {
        Self { decider }
    }
}

#[async_trait]
impl TypedStep for DecideStep {
    type Params = DecideParams;
    type Input = MetricArtifact;
    type Output = PromotionArtifact;

    fn id(&self) -> &str {
        super::DECIDE_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Gate
    }

    async fn run_typed(&self, input: Option<MetricArtifact>, p: DecideParams) -> StepRunResultTyped<PromotionArtifact> {
        let Some(metric) = input else {
            return StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs };
        };
        let reading: MetricReading = metric.into();
        let decider = Arc::clone(&self.decider);
        // El registro es síncrono (archivo / Postgres).
        let res = tokio::task::spawn_blocking(move || decider.decide_reading(&p.model_name, &reading)).await;
        match res {
            Ok(Ok(decision)) => StepRunResultTyped::single(decision.into()),
            Ok(Err(e)) => StepRunResultTyped::Failure { error: e.into() },
            Err(e) => StepRunResultTyped::Failure { error: CoreEngineError::Internal(format!("decide task aborted: {e}")) },
        }
    }
}
