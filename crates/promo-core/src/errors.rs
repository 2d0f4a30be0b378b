//! Errores específicos del core.
//!
//! Los errores de validación del DAG se detectan al construir la
//! `FlowDefinition`; los de ejecución quedan registrados en el event log
//! (`StepFailed`) además de devolverse al caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("flow already completed")]
    FlowCompleted,
    #[error("flow failed: steps {failed_steps:?}")]
    FlowFailed { failed_steps: Vec<String> },
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
    #[error("dependency cycle detected involving steps {0:?}")]
    CycleDetected(Vec<String>),
    #[error("invalid gate '{gate}' for condition group '{group}'")]
    InvalidGate { group: String, gate: String },
    #[error("gate '{gate}' did not produce a boolean '{key}'")]
    GateOutputNotBoolean { gate: String, key: String },
    #[error("missing required inputs")]
    MissingInputs,
    #[error("{kind}: {message}")]
    StepError { kind: String, message: String },
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl CoreEngineError {
    /// Atajo para errores reportados por un step.
    pub fn step(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepError { kind: kind.into(),
                          message: message.into() }
    }
}
