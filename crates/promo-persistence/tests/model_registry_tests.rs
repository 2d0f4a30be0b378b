mod test_support;

use std::sync::Arc;

use promo_domain::{Checkpoint, JobId, ModelLookup, ModelRegistry, PipelineError};
use promo_persistence::PgModelRegistry;
use serde_json::json;
use uuid::Uuid;

fn checkpoint(uuid: &str, loss: f64) -> Checkpoint {
    Checkpoint { uuid: uuid.into(),
                 job_id: JobId::new("1"),
                 metrics: json!({"validation_metrics": {"validation_loss": loss}}),
                 experiment_config: json!({"searcher": {"metric": "validation_loss", "smaller_is_better": true}}) }
}

fn unique_name() -> String {
    format!("model-{}", Uuid::new_v4())
}

#[test]
fn lookup_walks_through_states() {
    let Some(provider) = test_support::provider("lookup_walks_through_states") else {
        return;
    };
    let reg = PgModelRegistry::new(provider);
    let name = unique_name();
    assert_eq!(reg.lookup(&name).unwrap(), ModelLookup::NotFound);
    let model = reg.create_model(&name).unwrap();
    assert_eq!(reg.create_model(&name).unwrap(), model);
    assert!(matches!(reg.lookup(&name).unwrap(), ModelLookup::NoVersions(_)));

    let v1 = reg.register_version(&name, &checkpoint("c1", 0.3)).unwrap();
    let v2 = reg.register_version(&name, &checkpoint("c2", 0.2)).unwrap();
    assert_eq!((v1.version, v2.version), (1, 2));
    match reg.lookup(&name).unwrap() {
        ModelLookup::Current(_, v) => {
            assert_eq!(v.version, 2);
            assert_eq!(v.checkpoint.metric("validation_loss"), Some(0.2));
        }
        other => panic!("unexpected {other:?}"),
    }
    let versions: Vec<u32> = reg.versions(&name).unwrap().iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2]);
}

#[test]
fn register_on_missing_model_is_rejected() {
    let Some(provider) = test_support::provider("register_on_missing_model_is_rejected") else {
        return;
    };
    let reg = PgModelRegistry::new(provider);
    let err = reg.register_version(&unique_name(), &checkpoint("c", 0.1)).unwrap_err();
    assert!(matches!(err, PipelineError::ModelRegistryUnavailable(_)));
}

#[test]
fn concurrent_registrations_get_distinct_versions() {
    let Some(provider) = test_support::provider("concurrent_registrations_get_distinct_versions") else {
        return;
    };
    let reg = Arc::new(PgModelRegistry::new(provider));
    let name = unique_name();
    reg.create_model(&name).unwrap();
    let handles: Vec<_> = (0..4).map(|i| {
                                    let reg = Arc::clone(&reg);
                                    let name = name.clone();
                                    std::thread::spawn(move || {
                                        reg.register_version(&name, &checkpoint(&format!("c{i}"), 0.1)).unwrap().version
                                    })
                                })
                                .collect();
    let mut got: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    got.sort();
    assert_eq!(got, vec![1, 2, 3, 4]);
}
