#![allow(dead_code)]
use std::sync::Arc;
use std::time::Duration;

use promo_adapters::memory::{checkpoint_with_metric, InMemoryModelRegistry, InMemoryServingPlatform, SimulatedJobPlatform,
                             StaticFetcher};
use promo_adapters::{Collaborators, PipelineParams, PollPolicy};
use promo_domain::{JobId, ModelRegistry};
use promo_policies::ModelLocks;

pub const METRIC: &str = "validation_loss";

pub fn fast_poll() -> PollPolicy {
    PollPolicy { interval: Duration::from_millis(1),
                 max_wait: Duration::from_secs(5) }
}

/// Fetcher que deja config y context donde los espera `TrainStep`.
pub fn repo_fetcher() -> StaticFetcher {
    let p = PipelineParams::default();
    StaticFetcher::new().with_file(&p.config, "searcher:\n  metric: validation_loss\n")
                        .with_file(format!("{}model_def.py", p.context), "# trial\n")
}

/// Registra una versión previa con la métrica dada.
pub fn seed_version(registry: &dyn ModelRegistry, model: &str, value: f64) {
    registry.create_model(model).unwrap();
    let ckpt = checkpoint_with_metric("seed", &JobId::new("0"), METRIC, value, true);
    registry.register_version(model, &ckpt).unwrap();
}

pub struct Harness {
    pub jobs: Arc<SimulatedJobPlatform>,
    pub registry: Arc<InMemoryModelRegistry>,
    pub serving: Arc<InMemoryServingPlatform>,
    pub collaborators: Collaborators,
}

pub fn harness(jobs: SimulatedJobPlatform) -> Harness {
    let jobs = Arc::new(jobs.requiring_files());
    let registry = Arc::new(InMemoryModelRegistry::new());
    let serving = Arc::new(InMemoryServingPlatform::new());
    let collaborators = Collaborators::new(Arc::new(repo_fetcher()), jobs.clone(), registry.clone(), serving.clone())
        .with_poll(fast_poll())
        .with_locks(ModelLocks::default());
    Harness { jobs,
              registry,
              serving,
              collaborators }
}
