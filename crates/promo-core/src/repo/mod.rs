//! Definición del DAG y reconstrucción de estado por replay.

mod definition;
mod types;

pub use definition::{ConditionGroup, FlowDefinition, FlowDefinitionBuilder, StepNode};
pub use types::{FlowInstance, FlowRepository, InMemoryFlowRepository, StepSlot};
