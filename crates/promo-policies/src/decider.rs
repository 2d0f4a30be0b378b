use std::sync::Arc;

use log::{debug, info};
use promo_domain::{Checkpoint, MetricReading, ModelLookup, ModelRegistry, PipelineError, PromotionDecision,
                   PromotionOutcome, SearcherObjective};

use crate::{params_hash, ModelLocks, PromotionPolicy, StrictImprovementPolicy};

pub struct PromotionDecider {
    registry: Arc<dyn ModelRegistry>,
    policy: Box<dyn PromotionPolicy>,
    locks: ModelLocks,
}

impl std::fmt::Debug for PromotionDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionDecider").field("policy", &self.policy.id()).finish_non_exhaustive()
    }
}

impl PromotionDecider {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self { registry,
               policy: Box::new(StrictImprovementPolicy),
               locks: ModelLocks::global() }
    }

    pub fn with_locks(mut self, locks: ModelLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Decide a partir de una lectura de métrica (nombre y dirección
    /// incluidos).
    pub fn decide_reading(&self, model_name: &str, reading: &MetricReading) -> Result<PromotionDecision, PipelineError> {
        self.decide_with(model_name,
                         Some(reading.name.as_str()),
                         reading.value,
                         reading.smaller_is_better,
                         &reading.checkpoint)
    }

    /// El nombre de la métrica se toma de la configuración del experimento
    /// del candidato.
    pub fn decide(&self,
                  model_name: &str,
                  new_metric: f64,
                  smaller_is_better: bool,
                  checkpoint: &Checkpoint)
                  -> Result<PromotionDecision, PipelineError> {
        self.decide_with(model_name, None, new_metric, smaller_is_better, checkpoint)
    }

    fn decide_with(&self,
                   model_name: &str,
                   metric_name: Option<&str>,
                   new_metric: f64,
                   smaller_is_better: bool,
                   checkpoint: &Checkpoint)
                   -> Result<PromotionDecision, PipelineError> {
        let metric_name = match metric_name {
            Some(n) => Ok(n.to_string()),
            None => SearcherObjective::from_experiment_config(&checkpoint.experiment_config).map(|o| o.metric),
        };
        self.locks.with_lock(model_name, || -> Result<PromotionDecision, PipelineError> {
                      let mut decision = None;
                      self.registry.exclusive(model_name, &mut || -> Result<(), PipelineError> {
                                       decision = Some(self.evaluate(model_name,
                                                                     metric_name.clone(),
                                                                     new_metric,
                                                                     smaller_is_better,
                                                                     checkpoint)?);
                                       Ok(())
                                   })?;
                      decision.ok_or_else(|| {
                                  PipelineError::ModelRegistryUnavailable(format!("registry skipped the decision for '{model_name}'"))
                              })
                  })
    }

    /// Leer, comparar y registrar. Corre con el modelo bloqueado.
    fn evaluate(&self,
                model_name: &str,
                metric_name: Result<String, PipelineError>,
                new_metric: f64,
                smaller_is_better: bool,
                checkpoint: &Checkpoint)
                -> Result<PromotionDecision, PipelineError> {
        let mut decision = PromotionDecision { model_name: model_name.to_string(),
                                               promoted: false,
                                               outcome: PromotionOutcome::Unchanged,
                                               metric_name: metric_name.clone().unwrap_or_default(),
                                               smaller_is_better,
                                               candidate_metric: new_metric,
                                               previous_metric: None,
                                               registered_version: None,
                                               policy: self.policy.id().to_string(),
                                               policy_hash: params_hash(&self.policy.params()) };
        match self.registry.lookup(model_name)? {
            ModelLookup::NotFound => {
                info!("Registering new Model: {model_name}");
                self.registry.create_model(model_name)?;
                let v = self.registry.register_version(model_name, checkpoint)?;
                decision.promoted = true;
                decision.outcome = PromotionOutcome::CreatedWithFirstVersion;
                decision.registered_version = Some(v.version);
            }
            ModelLookup::NoVersions(_) => {
                info!("Registering new version: {model_name}");
                let v = self.registry.register_version(model_name, checkpoint)?;
                decision.promoted = true;
                decision.outcome = PromotionOutcome::FirstVersion;
                decision.registered_version = Some(v.version);
            }
            ModelLookup::Current(_, current) => {
                let name = metric_name?;
                let old = current.checkpoint
                                 .metric(&name)
                                 .ok_or_else(|| PipelineError::MetricNotFound { metric: name.clone(),
                                                                                checkpoint: current.checkpoint.uuid.clone() })?;
                decision.previous_metric = Some(old);
                debug!("{model_name}: candidate {new_metric} vs v{} {old} (policy {})",
                       current.version,
                       self.policy.id());
                if self.policy.is_better(new_metric, old, smaller_is_better) {
                    info!("Registering new version: {model_name}");
                    let v = self.registry.register_version(model_name, checkpoint)?;
                    decision.promoted = true;
                    decision.outcome = PromotionOutcome::Registered;
                    decision.registered_version = Some(v.version);
                } else {
                    info!("Previous model version was better, logging...");
                }
            }
        }
        Ok(decision)
    }
}
