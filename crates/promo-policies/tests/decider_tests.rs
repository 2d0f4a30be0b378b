use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use promo_domain::{Checkpoint, JobId, MetricReading, Model, ModelLookup, ModelRegistry, ModelVersion, PipelineError,
                   PromotionOutcome};
use promo_policies::{params_hash, ModelLocks, PolicyParams, PromotionDecider};
use serde_json::json;

/// Registro en memoria con contador de mutaciones.
#[derive(Default)]
struct CountingRegistry {
    models: Mutex<HashMap<String, (Model, Vec<ModelVersion>)>>,
    mutations: AtomicUsize,
    exclusive_sections: AtomicUsize,
    down: bool,
}

impl CountingRegistry {
    fn down() -> Self {
        Self { down: true,
               ..Default::default() }
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.down {
            Err(PipelineError::ModelRegistryUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl ModelRegistry for CountingRegistry {
    fn lookup(&self, name: &str) -> Result<ModelLookup, PipelineError> {
        self.check()?;
        let models = self.models.lock().unwrap();
        Ok(match models.get(name) {
            None => ModelLookup::NotFound,
            Some((m, v)) if v.is_empty() => ModelLookup::NoVersions(m.clone()),
            Some((m, v)) => ModelLookup::Current(m.clone(), v[v.len() - 1].clone()),
        })
    }

    fn create_model(&self, name: &str) -> Result<Model, PipelineError> {
        self.check()?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let m = Model { name: name.into(),
                        created_at: Utc::now() };
        self.models.lock().unwrap().insert(name.into(), (m.clone(), vec![]));
        Ok(m)
    }

    fn register_version(&self, name: &str, checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError> {
        self.check()?;
        // Ventana amplia entre lectura y escritura para exponer carreras.
        std::thread::yield_now();
        let mut models = self.models.lock().unwrap();
        let (_, versions) = models.get_mut(name)
                                  .ok_or_else(|| PipelineError::ModelRegistryUnavailable(format!("no model {name}")))?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let v = ModelVersion { model_name: name.into(),
                               version: versions.len() as u32 + 1,
                               checkpoint: checkpoint.clone(),
                               registered_at: Utc::now() };
        versions.push(v.clone());
        Ok(v)
    }

    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>, PipelineError> {
        self.check()?;
        Ok(self.models.lock().unwrap().get(name).map(|(_, v)| v.clone()).unwrap_or_default())
    }

    fn exclusive(&self,
                 _name: &str,
                 section: &mut dyn FnMut() -> Result<(), PipelineError>)
                 -> Result<(), PipelineError> {
        self.exclusive_sections.fetch_add(1, Ordering::SeqCst);
        section()
    }
}

fn ckpt(uuid: &str, loss: f64, smaller_is_better: bool) -> Checkpoint {
    Checkpoint { uuid: uuid.into(),
                 job_id: JobId::new(uuid),
                 metrics: json!({"validation_metrics": {"validation_loss": loss}}),
                 experiment_config: json!({"searcher": {"metric": "validation_loss", "smaller_is_better": smaller_is_better}}) }
}

fn decider(reg: &Arc<CountingRegistry>) -> PromotionDecider {
    PromotionDecider::new(reg.clone()).with_locks(ModelLocks::default())
}

#[test]
fn decision_matches_strict_comparison_for_all_directions() {
    let values = [0.0, 0.01, 0.02, 0.5, 1.0, -3.0];
    for &old in &values {
        for &new in &values {
            for sib in [true, false] {
                let reg = Arc::new(CountingRegistry::default());
                let d = decider(&reg);
                d.decide("m", old, sib, &ckpt("old", old, sib)).unwrap();
                let decision = d.decide("m", new, sib, &ckpt("new", new, sib)).unwrap();
                let expected = (sib && new < old) || (!sib && new > old);
                assert_eq!(decision.promoted, expected, "old={old} new={new} smaller_is_better={sib}");
                assert_eq!(decision.previous_metric, Some(old));
                if new == old {
                    assert!(!decision.promoted);
                }
            }
        }
    }
}

#[test]
fn first_promotion_creates_model_with_one_version() {
    let reg = Arc::new(CountingRegistry::default());
    let d = decider(&reg).decide("mnist-prod", 0.02, true, &ckpt("c1", 0.02, true)).unwrap();
    assert!(d.promoted);
    assert_eq!(d.outcome, PromotionOutcome::CreatedWithFirstVersion);
    assert_eq!(d.registered_version, Some(1));
    let versions = reg.versions("mnist-prod").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].checkpoint.uuid, "c1");
}

#[test]
fn model_without_versions_gets_first_version() {
    let reg = Arc::new(CountingRegistry::default());
    reg.create_model("m").unwrap();
    let d = decider(&reg).decide("m", 0.3, false, &ckpt("c1", 0.3, false)).unwrap();
    assert!(d.promoted);
    assert_eq!(d.outcome, PromotionOutcome::FirstVersion);
    assert_eq!(reg.versions("m").unwrap().len(), 1);
}

#[test]
fn losing_candidate_never_mutates_registry() {
    let reg = Arc::new(CountingRegistry::default());
    let d = decider(&reg);
    d.decide("m", 0.01, true, &ckpt("c1", 0.01, true)).unwrap();
    let before = reg.versions("m").unwrap();
    let mutations = reg.mutations.load(Ordering::SeqCst);

    let loss = d.decide("m", 0.02, true, &ckpt("c2", 0.02, true)).unwrap();
    assert!(!loss.promoted);
    assert_eq!(loss.outcome, PromotionOutcome::Unchanged);
    assert_eq!(loss.registered_version, None);
    assert_eq!(reg.versions("m").unwrap(), before);
    assert_eq!(reg.mutations.load(Ordering::SeqCst), mutations);
}

#[test]
fn compares_against_latest_version_only() {
    let reg = Arc::new(CountingRegistry::default());
    let d = decider(&reg);
    // v1 = 0.9, v2 = 0.5 (larger is better: v2 fue registrada a mano)
    d.decide("m", 0.9, false, &ckpt("v1", 0.9, false)).unwrap();
    reg.register_version("m", &ckpt("v2", 0.5, false)).unwrap();
    let d3 = d.decide("m", 0.6, false, &ckpt("v3", 0.6, false)).unwrap();
    assert!(d3.promoted, "0.6 beats latest (0.5) even though v1 was better");
    assert_eq!(d3.registered_version, Some(3));
}

#[test]
fn decide_reading_uses_reading_metric_name() {
    let reg = Arc::new(CountingRegistry::default());
    let d = decider(&reg);
    let mut old = ckpt("c1", 0.2, true);
    old.metrics = json!({"validationMetrics": {"validation_loss": 0.2}});
    d.decide("m", 0.2, true, &old).unwrap();
    let reading = MetricReading::from_checkpoint(ckpt("c2", 0.1, true)).unwrap();
    let dec = d.decide_reading("m", &reading).unwrap();
    assert!(dec.promoted);
    assert_eq!(dec.metric_name, "validation_loss");
    assert_eq!(dec.previous_metric, Some(0.2));
}

#[test]
fn registry_unavailable_is_an_error_not_a_loss() {
    let reg = Arc::new(CountingRegistry::down());
    let err = decider(&reg).decide("m", 0.1, true, &ckpt("c", 0.1, true)).unwrap_err();
    assert!(matches!(err, PipelineError::ModelRegistryUnavailable(_)));
}

#[test]
fn concurrent_decisions_on_same_model_are_serialised() {
    let reg = Arc::new(CountingRegistry::default());
    let locks = ModelLocks::default();
    let handles: Vec<_> = (0..8).map(|i| {
                                    let reg = reg.clone();
                                    let locks = locks.clone();
                                    std::thread::spawn(move || {
                                        PromotionDecider::new(reg).with_locks(locks)
                                                                  .decide("shared", 0.5, true, &ckpt(&format!("c{i}"), 0.5, true))
                                                                  .unwrap()
                                    })
                                })
                                .collect();
    let promoted = handles.into_iter().map(|h| h.join().unwrap()).filter(|d| d.promoted).count();
    assert_eq!(promoted, 1);
    assert_eq!(reg.versions("shared").unwrap().len(), 1);
}

#[test]
fn decision_records_policy_and_runs_inside_registry_section() {
    let reg = Arc::new(CountingRegistry::default());
    let d = decider(&reg);
    let first = d.decide("m", 0.2, true, &ckpt("c1", 0.2, true)).unwrap();
    let second = d.decide("m", 0.3, true, &ckpt("c2", 0.3, true)).unwrap();
    for dec in [&first, &second] {
        assert_eq!(dec.policy, "strict_improvement");
        assert_eq!(dec.policy_hash, params_hash(&PolicyParams::StrictImprovement));
    }
    assert_eq!(reg.exclusive_sections.load(Ordering::SeqCst), 2);
}
