//! Artifacts tipados que intercambian los steps del pipeline.
//!
//! Sólo definen la forma del `payload` JSON; el hash lo calcula el engine
//! sobre el payload canónico.

use promo_core::typed_artifact;
use promo_domain::{Checkpoint, JobState, PromotionOutcome};

// Repositorio descargado dentro del workspace compartido.
typed_artifact!(WorkspaceArtifact {
    root: String,
    repo_dir: String,
    repo_url: String,
    branch: String,
});

typed_artifact!(JobArtifact {
    job_id: String,
    state: JobState,
});

typed_artifact!(MetricArtifact {
    metric_name: String,
    value: f64,
    smaller_is_better: bool,
    checkpoint: Checkpoint,
});

// Salida del gate: `promoted` selecciona el grupo condicional.
typed_artifact!(PromotionArtifact {
    promoted: bool,
    model_name: String,
    outcome: PromotionOutcome,
    metric_name: String,
    smaller_is_better: bool,
    candidate_metric: f64,
    previous_metric: Option<f64>,
    registered_version: Option<u32>,
    policy: String,
    policy_hash: String,
});

typed_artifact!(DeploymentArtifact {
    name: String,
    namespace: String,
    model_name: String,
    model_version: u32,
    serving_image: String,
    endpoint: String,
    created: bool,
});

typed_artifact!(NotificationArtifact {
    message: String,
    model_name: String,
    candidate_metric: f64,
    previous_metric: Option<f64>,
});
