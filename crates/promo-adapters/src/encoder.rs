//! Conversión Dominio ↔ Artifact.
//!
//! Los steps producen artifacts tipados a partir de entidades de dominio y
//! el `PipelineRunner` reconstruye las entidades desde los artifacts que
//! quedaron en el engine.

use promo_domain::{Deployment, JobId, MetricReading, PromotionDecision};

use crate::artifacts::{DeploymentArtifact, MetricArtifact, PromotionArtifact};

impl From<MetricReading> for MetricArtifact {
    fn from(r: MetricReading) -> Self {
        Self { metric_name: r.name,
               value: r.value,
               smaller_is_better: r.smaller_is_better,
               checkpoint: r.checkpoint,
               schema_version: 1 }
    }
}

impl From<MetricArtifact> for MetricReading {
    fn from(a: MetricArtifact) -> Self {
        Self { name: a.metric_name,
               value: a.value,
               smaller_is_better: a.smaller_is_better,
               checkpoint: a.checkpoint }
    }
}

impl From<PromotionDecision> for PromotionArtifact {
    fn from(d: PromotionDecision) -> Self {
        Self { promoted: d.promoted,
               model_name: d.model_name,
               outcome: d.outcome,
               metric_name: d.metric_name,
               smaller_is_better: d.smaller_is_better,
               candidate_metric: d.candidate_metric,
               previous_metric: d.previous_metric,
               registered_version: d.registered_version,
               policy: d.policy,
               policy_hash: d.policy_hash,
               schema_version: 1 }
    }
}

impl From<PromotionArtifact> for PromotionDecision {
    fn from(a: PromotionArtifact) -> Self {
        Self { model_name: a.model_name,
               promoted: a.promoted,
               outcome: a.outcome,
               metric_name: a.metric_name,
               smaller_is_better: a.smaller_is_better,
               candidate_metric: a.candidate_metric,
               previous_metric: a.previous_metric,
               registered_version: a.registered_version,
               policy: a.policy,
               policy_hash: a.policy_hash }
    }
}

impl From<Deployment> for DeploymentArtifact {
    fn from(d: Deployment) -> Self {
        Self { name: d.name,
               namespace: d.namespace,
               model_name: d.model_name,
               model_version: d.model_version,
               serving_image: d.serving_image,
               endpoint: d.endpoint,
               created: d.created,
               schema_version: 1 }
    }
}

impl From<DeploymentArtifact> for Deployment {
    fn from(a: DeploymentArtifact) -> Self {
        Self { name: a.name,
               namespace: a.namespace,
               model_name: a.model_name,
               model_version: a.model_version,
               serving_image: a.serving_image,
               endpoint: a.endpoint,
               created: a.created }
    }
}

/// Job id tal como viaja en `JobArtifact`.
pub fn job_id_of(artifact: &crate::artifacts::JobArtifact) -> JobId {
    JobId::new(artifact.job_id.clone())
}
