use serde::{Deserialize, Serialize};

/// Estado de un Step en tiempo de ejecución.
///
/// Transiciones válidas:
/// - `Pending` -> `Ready` (todas las dependencias en `Succeeded`)
/// - `Ready` -> `Running` -> `Succeeded` | `Failed`
/// - `Pending` -> `Skipped` (rama no tomada o dependencia fallida/omitida)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped(_))
    }
}

/// Motivo por el que un step nunca se materializó.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// El gate de su grupo condicional eligió la otra rama.
    BranchNotTaken { group: String, gate: String },
    /// Una dependencia falló.
    UpstreamFailed { step_id: String },
    /// Una dependencia fue omitida.
    UpstreamSkipped { step_id: String },
}
