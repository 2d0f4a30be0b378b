use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use promo_core::CoreEngineError;
use promo_domain::MetricExtractor;

use crate::artifacts::{JobArtifact, MetricArtifact};
use crate::encoder::job_id_of;

#[derive(Debug)]
pub struct ExtractMetricStep {
    extractor: MetricExtractor,
}

impl ExtractMetricStep {
    pub fn new(extractor: MetricExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl TypedStep for ExtractMetricStep {
    type Params = ();
    type Input = JobArtifact;
    type Output = MetricArtifact;

    fn id(&self) -> &str {
        super::EXTRACT_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    async fn run_typed(&self, input: Option<JobArtifact>, _p: ()) -> StepRunResultTyped<MetricArtifact> {
        let Some(job) = input else {
            return StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs };
        };
        match self.extractor.best_metric(&job_id_of(&job)).await {
            Ok(reading) => StepRunResultTyped::single(reading.into()),
            Err(e) => StepRunResultTyped::Failure { error: e.into() },
        }
    }
}
