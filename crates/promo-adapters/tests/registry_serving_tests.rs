mod common;

use std::sync::{Arc, Barrier};

use common::{seed_version, METRIC};
use promo_adapters::memory::{checkpoint_with_metric, InMemoryModelRegistry, InMemoryServingPlatform};
use promo_adapters::registry::JsonFileModelRegistry;
use promo_adapters::serving::ManifestServingPlatform;
use promo_adapters::DeploymentTrigger;
use promo_domain::{JobId, ModelLookup, ModelRegistry, PipelineError};
use promo_policies::{ModelLocks, PromotionDecider};

#[test]
fn json_registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    {
        let reg = JsonFileModelRegistry::new(&path);
        assert!(matches!(reg.lookup("m").unwrap(), ModelLookup::NotFound));
        reg.create_model("m").unwrap();
        assert!(matches!(reg.lookup("m").unwrap(), ModelLookup::NoVersions(_)));
        reg.register_version("m", &checkpoint_with_metric("c1", &JobId::new("1"), METRIC, 0.2, true))
           .unwrap();
    }
    let reg = JsonFileModelRegistry::new(&path);
    let v = reg.register_version("m", &checkpoint_with_metric("c2", &JobId::new("2"), METRIC, 0.1, true))
               .unwrap();
    assert_eq!(v.version, 2);
    match reg.lookup("m").unwrap() {
        ModelLookup::Current(model, current) => {
            assert_eq!(model.name, "m");
            assert_eq!(current.checkpoint.uuid, "c2");
            assert_eq!(current.checkpoint.metric(METRIC), Some(0.1));
        }
        other => panic!("unexpected {other:?}"),
    }
    let versions: Vec<u32> = reg.versions("m").unwrap().iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2]);
}

#[test]
fn registering_on_unknown_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let reg = JsonFileModelRegistry::new(dir.path().join("r.json"));
    let err = reg.register_version("ghost", &checkpoint_with_metric("c", &JobId::new("1"), METRIC, 0.2, true))
                 .unwrap_err();
    assert!(matches!(err, PipelineError::ModelRegistryUnavailable(_)));
}

#[test]
fn corrupt_registry_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = JsonFileModelRegistry::new(&path).lookup("m").unwrap_err();
    assert_eq!(err.kind(), "ModelRegistryUnavailable");
}

#[test]
fn json_registries_on_one_file_never_lose_a_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.json");
    for round in 0..20 {
        let model = format!("m{round}");
        let barrier = Arc::new(Barrier::new(2));
        let outcomes: Vec<_> = [0.5, 0.4].into_iter()
                                         .enumerate()
                                         .map(|(i, value)| {
                                             let path = path.clone();
                                             let model = model.clone();
                                             let barrier = barrier.clone();
                                             std::thread::spawn(move || {
                                                 // Cada hilo hace de proceso aparte: registro y locks propios.
                                                 let reg = Arc::new(JsonFileModelRegistry::new(&path));
                                                 let decider = PromotionDecider::new(reg).with_locks(ModelLocks::default());
                                                 let ckpt = checkpoint_with_metric(&format!("c{i}"), &JobId::new(i.to_string()), METRIC, value, true);
                                                 barrier.wait();
                                                 decider.decide(&model, value, true, &ckpt).unwrap()
                                             })
                                         })
                                         .collect();
        let promoted = outcomes.into_iter().map(|h| h.join().unwrap()).filter(|d| d.promoted).count();
        let stored: Vec<u32> = JsonFileModelRegistry::new(&path).versions(&model)
                                                                .unwrap()
                                                                .iter()
                                                                .map(|v| v.version)
                                                                .collect();
        assert_eq!(promoted, stored.len(), "round {round}: {stored:?}");
        assert_eq!(stored, (1..=stored.len() as u32).collect::<Vec<_>>());
    }
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap()
                                                         .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                                                         .filter(|n| n.ends_with(".tmp"))
                                                         .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn nested_registry_calls_inside_exclusive_section_do_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let reg = JsonFileModelRegistry::new(dir.path().join("r.json"));
    let mut registered = None;
    reg.exclusive("m", &mut || -> Result<(), PipelineError> {
           reg.create_model("m")?;
           registered = Some(reg.register_version("m", &checkpoint_with_metric("c", &JobId::new("1"), METRIC, 0.2, true))?);
           Ok(())
       })
       .unwrap();
    assert_eq!(registered.map(|v| v.version), Some(1));
    assert!(reg.lock_path().exists());
    assert_eq!(reg.versions("m").unwrap().len(), 1);
}

#[tokio::test]
async fn manifest_platform_writes_seldon_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(InMemoryModelRegistry::new());
    seed_version(registry.as_ref(), "mnist-prod", 0.1);
    let serving = Arc::new(ManifestServingPlatform::new(dir.path(), "http://gateway"));
    let trigger = DeploymentTrigger::new(registry, serving.clone());

    let first = trigger.deploy("mnist-prod-kf", "david", "mnist-prod", "img:1").await.unwrap();
    assert!(first.created);
    assert_eq!(first.endpoint, "http://gateway/seldon/david/mnist-prod-kf/api/v1.0/predictions");
    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(serving.manifest_path("david", "mnist-prod-kf")).unwrap()).unwrap();
    assert_eq!(manifest["kind"], "SeldonDeployment");
    assert_eq!(manifest["spec"]["predictors"][0]["componentSpecs"][0]["spec"]["containers"][0]["image"], "img:1");
    assert_eq!(manifest["metadata"]["labels"]["promoflow/version"], "1");

    let second = trigger.deploy("mnist-prod-kf", "david", "mnist-prod", "img:2").await.unwrap();
    assert!(!second.created);
}

#[tokio::test]
async fn trigger_requires_registered_version() {
    let registry = Arc::new(InMemoryModelRegistry::new());
    registry.create_model("empty").unwrap();
    let trigger = DeploymentTrigger::new(registry, Arc::new(InMemoryServingPlatform::new()));
    let err = trigger.deploy("d", "ns", "empty", "img").await.unwrap_err();
    assert_eq!(err.kind(), "DeploymentError");
}

#[tokio::test]
async fn trigger_rejects_empty_fields() {
    let registry = Arc::new(InMemoryModelRegistry::new());
    seed_version(registry.as_ref(), "m", 0.1);
    let trigger = DeploymentTrigger::new(registry, Arc::new(InMemoryServingPlatform::new()));
    let err = trigger.deploy("d", " ", "m", "img").await.unwrap_err();
    assert_eq!(err, PipelineError::Deployment("empty deployment namespace".into()));
}

#[tokio::test]
async fn serving_rejection_is_deployment_error() {
    let registry = Arc::new(InMemoryModelRegistry::new());
    seed_version(registry.as_ref(), "m", 0.1);
    let trigger = DeploymentTrigger::new(registry, Arc::new(InMemoryServingPlatform::rejecting("forbidden")));
    let err = trigger.deploy("d", "ns", "m", "img").await.unwrap_err();
    assert_eq!(err, PipelineError::Deployment("forbidden".into()));
}
