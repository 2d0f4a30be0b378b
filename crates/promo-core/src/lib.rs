//! promo-core: motor DAG determinista con grupos condicionales.
//!
//! Un `FlowDefinition` declara steps, sus dependencias `after` y grupos
//! condicionales seleccionados por un gate. El `FlowEngine` ejecuta el DAG por
//! olas, registrando todo en un `EventStore` append-only; el estado se
//! reconstruye siempre por replay.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod injection;
pub mod model;
pub mod repo;
pub mod step;

pub use engine::{EngineBuilder, EngineBuilderInit, FlowEngine};
pub use errors::CoreEngineError;
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
pub use injection::{merge_json, CompositeInjector, ParamInjector};
pub use model::{Artifact, ArtifactDecodeError, ArtifactKind, ArtifactSpec, ExecutionContext};
pub use repo::{ConditionGroup, FlowDefinition, FlowDefinitionBuilder, FlowInstance, FlowRepository, InMemoryFlowRepository,
               StepNode, StepSlot};
pub use step::{SkipReason, StepDefinition, StepKind, StepRunResult, StepRunResultTyped, StepSignal, StepStatus, TypedStep};
