use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use promo_core::model::{Artifact, ArtifactKind, ExecutionContext};
use promo_core::step::{StepDefinition, StepKind, StepRunResult};
use promo_core::{FlowDefinition, FlowEngine};
use serde_json::{json, Value};
use tokio::sync::Barrier;

/// Sólo termina si otro step de la misma ola alcanza la barrera.
#[derive(Debug)]
struct Rendezvous {
    id: &'static str,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl StepDefinition for Rendezvous {
    fn id(&self) -> &str {
        self.id
    }

    fn base_params(&self) -> Value {
        json!({})
    }

    async fn run(&self, _ctx: &ExecutionContext) -> StepRunResult {
        self.barrier.wait().await;
        StepRunResult::Success { outputs: vec![Artifact::new_unhashed(ArtifactKind::GenericJson,
                                                                      json!({"id": self.id}),
                                                                      None)] }
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }
}

fn definition(barrier: &Arc<Barrier>) -> FlowDefinition {
    FlowDefinition::builder().step(Box::new(Rendezvous { id: "left",
                                                         barrier: Arc::clone(barrier) }))
                             .step(Box::new(Rendezvous { id: "right",
                                                         barrier: Arc::clone(barrier) }))
                             .build()
                             .unwrap()
}

#[tokio::test]
async fn independent_ready_steps_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let mut engine = FlowEngine::new().definition(definition(&barrier)).build();
    let res = tokio::time::timeout(Duration::from_secs(5), engine.run()).await;
    assert!(matches!(res, Ok(Ok(_))), "both steps should meet at the barrier");
    assert_eq!(engine.event_variants().unwrap(), vec!["I", "S", "S", "F", "F", "C"]);
}

#[tokio::test]
async fn max_parallel_one_serialises_the_wave() {
    let barrier = Arc::new(Barrier::new(2));
    let mut engine = FlowEngine::new().definition(definition(&barrier)).max_parallel(1).build();
    let res = tokio::time::timeout(Duration::from_millis(300), engine.run()).await;
    assert!(res.is_err(), "with a single slot the barrier can never be met");
}
