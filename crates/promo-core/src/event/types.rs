//! Tipos de evento del flujo y estructura `FlowEvent`.
//!
//! Cada ejecución del `FlowEngine` emite eventos a un `EventStore`
//! append-only. El replay de estos eventos (ver `repo`) reconstruye el estado
//! de cada step y la rama elegida por cada gate, sin estructuras mutables.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreEngineError;
use crate::step::SkipReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Primer evento de un `flow_id`: fija la `definition_hash` y la cantidad
    /// de steps.
    FlowInitialized { definition_hash: String, step_count: usize },
    /// Un step comenzó su ejecución. No implica éxito.
    StepStarted { step_index: usize, step_id: String },
    /// Un step terminó correctamente, con sus outputs (hashes) y fingerprint.
    StepFinished {
        step_index: usize,
        step_id: String,
        outputs: Vec<String>,
        fingerprint: String,
    },
    /// Un step terminó con error. Sus dependientes no se ejecutarán.
    StepFailed {
        step_index: usize,
        step_id: String,
        error: CoreEngineError,
        fingerprint: String,
    },
    /// Un step no se materializa en esta ejecución.
    StepSkipped { step_index: usize, step_id: String, reason: SkipReason },
    /// Hito ligero comunicado por un step.
    StepSignal {
        step_index: usize,
        step_id: String,
        signal: String,
        data: serde_json::Value,
    },
    /// El gate de un grupo condicional fue evaluado (una sola vez por flow).
    BranchSelected { gate_id: String, key: String, value: bool },
    /// Cierre exitoso con fingerprint agregado del flow.
    FlowCompleted { flow_fingerprint: String },
    /// Cierre con al menos un step fallido.
    FlowFailed { failed_steps: Vec<String> },
}

impl FlowEventKind {
    /// Nombre estable en minúsculas de la variante (logging/persistencia).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FlowInitialized { .. } => "flowinitialized",
            Self::StepStarted { .. } => "stepstarted",
            Self::StepFinished { .. } => "stepfinished",
            Self::StepFailed { .. } => "stepfailed",
            Self::StepSkipped { .. } => "stepskipped",
            Self::StepSignal { .. } => "stepsignal",
            Self::BranchSelected { .. } => "branchselected",
            Self::FlowCompleted { .. } => "flowcompleted",
            Self::FlowFailed { .. } => "flowfailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    pub seq: u64,
    pub flow_id: Uuid,
    pub kind: FlowEventKind,
    pub ts: DateTime<Utc>, // no entra en fingerprint
}
