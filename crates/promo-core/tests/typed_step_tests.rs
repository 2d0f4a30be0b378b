use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use promo_core::{typed_artifact, ArtifactSpec, CoreEngineError, FlowDefinition, FlowEngine, FlowEventKind};
use serde::{Deserialize, Serialize};

typed_artifact!(Count { n: u32 });
typed_artifact!(Flag { big: bool });

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CountParams {
    start: u32,
}

#[derive(Debug)]
struct Produce;

#[async_trait]
impl TypedStep for Produce {
    type Params = CountParams;
    type Input = Count;
    type Output = Count;

    fn id(&self) -> &str {
        "produce"
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn params_default(&self) -> CountParams {
        CountParams { start: 41 }
    }

    async fn run_typed(&self, _input: Option<Count>, p: CountParams) -> StepRunResultTyped<Count> {
        StepRunResultTyped::single(Count { n: p.start + 1,
                                           schema_version: 1 })
    }
}

#[derive(Debug)]
struct Judge;

#[async_trait]
impl TypedStep for Judge {
    type Params = ();
    type Input = Count;
    type Output = Flag;

    fn id(&self) -> &str {
        "judge"
    }

    fn kind(&self) -> StepKind {
        StepKind::Gate
    }

    async fn run_typed(&self, input: Option<Count>, _p: ()) -> StepRunResultTyped<Flag> {
        match input {
            Some(c) => StepRunResultTyped::single(Flag { big: c.n > 40,
                                                         schema_version: 1 }),
            None => StepRunResultTyped::Failure { error: CoreEngineError::MissingInputs },
        }
    }
}

/// Espera un `Flag` pero se conecta a un `Count`.
#[derive(Debug)]
struct WrongInput;

#[async_trait]
impl TypedStep for WrongInput {
    type Params = ();
    type Input = Flag;
    type Output = Flag;

    fn id(&self) -> &str {
        "wrong"
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    async fn run_typed(&self, input: Option<Flag>, _p: ()) -> StepRunResultTyped<Flag> {
        StepRunResultTyped::single(input.unwrap_or(Flag { big: false,
                                                          schema_version: 1 }))
    }
}

#[tokio::test]
async fn typed_steps_exchange_decoded_artifacts() {
    let def = FlowDefinition::builder().step(Box::new(Produce))
                                       .step_after(Box::new(Judge), &["produce"])
                                       .build()
                                       .unwrap();
    let mut engine = FlowEngine::new().definition(def).build();
    engine.run().await.unwrap();
    let flag = Flag::from_artifact(&engine.artifact_for("judge").unwrap()).unwrap();
    assert!(flag.big);
}

#[tokio::test]
async fn mismatched_input_is_a_step_failure() {
    let def = FlowDefinition::builder().step(Box::new(Produce))
                                       .step_after(Box::new(WrongInput), &["produce"])
                                       .build()
                                       .unwrap();
    let mut engine = FlowEngine::new().definition(def).build();
    let err = engine.run().await.unwrap_err();
    assert_eq!(err, CoreEngineError::FlowFailed { failed_steps: vec!["wrong".into()] });
    let kind = engine.events().unwrap().into_iter().find_map(|e| match e.kind {
                                                       FlowEventKind::StepFailed { error: CoreEngineError::StepError { kind, .. },
                                                                                   .. } => Some(kind),
                                                       _ => None,
                                                   });
    assert_eq!(kind.as_deref(), Some("InvalidInput"));
}
