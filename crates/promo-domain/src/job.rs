use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identificador opaco de un job en la plataforma de entrenamiento.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pedido de entrenamiento. Las rutas ya vienen resueltas dentro del
/// repositorio descargado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub endpoint: String,
    pub config_path: PathBuf,
    pub context_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Mejor checkpoint de un job.
///
/// `metrics` es el documento de validación tal como lo entrega la
/// plataforma: las métricas viven bajo `validation_metrics` o, en
/// versiones anteriores, `validationMetrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub uuid: String,
    pub job_id: JobId,
    pub metrics: Value,
    pub experiment_config: Value,
}

impl Checkpoint {
    /// Valor numérico de una métrica de validación.
    pub fn metric(&self, name: &str) -> Option<f64> {
        crate::metrics::lookup_metric(&self.metrics, name)
    }
}
