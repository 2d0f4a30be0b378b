//! Lectura de la métrica de validación del mejor checkpoint de un job.
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Checkpoint, JobId, JobPlatform, PipelineError};

/// Contenedores candidatos de las métricas, en orden de preferencia.
pub const METRIC_CONTAINER_KEYS: [&str; 2] = ["validation_metrics", "validationMetrics"];

/// Busca `name` en los contenedores candidatos, en orden. Sólo cuenta un
/// valor numérico.
pub fn lookup_metric(metrics: &Value, name: &str) -> Option<f64> {
    METRIC_CONTAINER_KEYS.iter().find_map(|key| {
                                    let v = metrics.get(*key)?.get(name)?.as_f64()?;
                                    debug!("metric '{name}' read from '{key}'");
                                    Some(v)
                                })
}

/// Objetivo del searcher declarado en la configuración del experimento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearcherObjective {
    pub metric: String,
    pub smaller_is_better: bool,
}

impl SearcherObjective {
    /// Lee `searcher.metric` y `searcher.smaller_is_better` (por defecto
    /// `true`).
    pub fn from_experiment_config(config: &Value) -> Result<Self, PipelineError> {
        let searcher = config.get("searcher")
                             .and_then(Value::as_object)
                             .ok_or_else(|| PipelineError::InvalidSearcherConfig("missing 'searcher' section".into()))?;
        let metric = searcher.get("metric")
                             .and_then(Value::as_str)
                             .filter(|m| !m.is_empty())
                             .ok_or_else(|| PipelineError::InvalidSearcherConfig("missing 'searcher.metric'".into()))?;
        let smaller_is_better = match searcher.get("smaller_is_better") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(PipelineError::InvalidSearcherConfig(format!("'smaller_is_better' is not a boolean: {other}")));
            }
        };
        Ok(Self { metric: metric.to_string(),
                  smaller_is_better })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub name: String,
    pub value: f64,
    pub smaller_is_better: bool,
    pub checkpoint: Checkpoint,
}

impl MetricReading {
    /// Lectura pura a partir de un checkpoint ya obtenido.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, PipelineError> {
        let objective = SearcherObjective::from_experiment_config(&checkpoint.experiment_config)?;
        let value = checkpoint.metric(&objective.metric)
                              .ok_or_else(|| PipelineError::MetricNotFound { metric: objective.metric.clone(),
                                                                             checkpoint: checkpoint.uuid.clone() })?;
        Ok(Self { name: objective.metric,
                  value,
                  smaller_is_better: objective.smaller_is_better,
                  checkpoint })
    }
}

/// Extrae la métrica objetivo del mejor checkpoint de un job.
#[derive(Clone)]
pub struct MetricExtractor {
    platform: Arc<dyn JobPlatform>,
}

impl MetricExtractor {
    pub fn new(platform: Arc<dyn JobPlatform>) -> Self {
        Self { platform }
    }

    pub async fn best_metric(&self, job: &JobId) -> Result<MetricReading, PipelineError> {
        let checkpoint = self.platform.top_checkpoint(job).await?;
        MetricReading::from_checkpoint(checkpoint)
    }
}

impl std::fmt::Debug for MetricExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricExtractor").finish_non_exhaustive()
    }
}
