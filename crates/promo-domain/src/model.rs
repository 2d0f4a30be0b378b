use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Checkpoint;

/// Modelo registrado: secuencia append-only de versiones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Versión de un modelo. `version` se numera desde 1 en orden de registro y
/// la versión vigente es siempre la última.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub model_name: String,
    pub version: u32,
    pub checkpoint: Checkpoint,
    pub registered_at: DateTime<Utc>,
}

/// Resultado etiquetado de buscar un modelo por nombre.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelLookup {
    NotFound,
    /// Existe pero nunca se le registró una versión (estado parcial).
    NoVersions(Model),
    /// Existe y tiene versión vigente (la última registrada).
    Current(Model, ModelVersion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionOutcome {
    /// Modelo nuevo, candidato registrado como versión 1.
    CreatedWithFirstVersion,
    /// Modelo existente sin versiones, candidato registrado.
    FirstVersion,
    /// El candidato superó a la versión vigente.
    Registered,
    /// La versión vigente era igual o mejor; sin cambios.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub model_name: String,
    pub promoted: bool,
    pub outcome: PromotionOutcome,
    pub metric_name: String,
    pub smaller_is_better: bool,
    pub candidate_metric: f64,
    pub previous_metric: Option<f64>,
    pub registered_version: Option<u32>,
    /// Política que comparó y hash canónico de sus parámetros.
    pub policy: String,
    pub policy_hash: String,
}
