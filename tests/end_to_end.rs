//! Escenarios completos contra un repositorio local, registro JSON y
//! manifiestos en disco.
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use promo_adapters::registry::JsonFileModelRegistry;
use promo_adapters::{PollPolicy, RunOutcome, NOT_DEPLOYED_MESSAGE};
use promo_domain::{ModelLookup, ModelRegistry};
use promoflow::app::{render_report, report_exit_code, run_with_registry};
use promoflow::errors::{EXIT_FLOW_FAILED, EXIT_OK};
use promoflow::PipelineConfig;

struct Sandbox {
    _dir: tempfile::TempDir,
    cfg: PipelineConfig,
}

fn sandbox() -> Sandbox {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let mut cfg = PipelineConfig::default();
    let repo = root.join("repo");
    let config = repo.join(&cfg.params.config);
    fs::create_dir_all(config.parent().unwrap()).unwrap();
    fs::write(&config, "searcher:\n  metric: validation_loss\n  smaller_is_better: true\n").unwrap();
    fs::create_dir_all(repo.join(&cfg.params.context)).unwrap();
    fs::create_dir_all(root.join("ws")).unwrap();

    cfg.simulate = true;
    cfg.local_repo = Some(repo);
    cfg.workspace_dir = root.join("ws");
    cfg.registry_file = root.join("registry.json");
    cfg.manifest_dir = root.join("manifests");
    cfg.gateway = "http://gateway".into();
    cfg.poll = PollPolicy { interval: Duration::from_millis(1),
                            max_wait: Duration::from_secs(5) };
    Sandbox { _dir: dir, cfg }
}

fn registry(cfg: &PipelineConfig) -> Arc<JsonFileModelRegistry> {
    Arc::new(JsonFileModelRegistry::new(&cfg.registry_file))
}

fn current_version(cfg: &PipelineConfig) -> Option<u32> {
    match registry(cfg).lookup(&cfg.params.model_name).unwrap() {
        ModelLookup::Current(_, v) => Some(v.version),
        _ => None,
    }
}

#[tokio::test]
async fn first_worse_then_better_candidate() {
    let mut sb = sandbox();

    // A: sin modelo previo
    sb.cfg.training.value = 0.30;
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Deployed);
    assert_eq!(report_exit_code(&report), EXIT_OK);
    assert_eq!(current_version(&sb.cfg), Some(1));
    let manifest = sb.cfg.manifest_dir.join("david").join("mnist-prod-kf.json");
    assert!(manifest.exists());

    // B: peor que la versión vigente
    sb.cfg.training.value = 0.40;
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NotDeployed);
    assert_eq!(report.notice.as_deref(), Some(NOT_DEPLOYED_MESSAGE));
    assert!(render_report(&report).contains(NOT_DEPLOYED_MESSAGE));
    assert_eq!(current_version(&sb.cfg), Some(1));

    // C: mejor que la versión vigente
    sb.cfg.training.value = 0.10;
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Deployed);
    assert_eq!(report.deployment.as_ref().unwrap().model_version, 2);
    assert!(!report.deployment.as_ref().unwrap().created);
    assert_eq!(current_version(&sb.cfg), Some(2));
    let body: serde_json::Value = serde_json::from_slice(&fs::read(&manifest).unwrap()).unwrap();
    assert_eq!(body["metadata"]["labels"]["promoflow/version"], "2");

    // Cada ejecución desmonta su workspace.
    assert_eq!(fs::read_dir(&sb.cfg.workspace_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn tie_is_not_promoted() {
    let mut sb = sandbox();
    sb.cfg.training.value = 0.2;
    run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NotDeployed);
    assert_eq!(current_version(&sb.cfg), Some(1));
}

#[tokio::test]
async fn missing_config_file_fails_training() {
    let mut sb = sandbox();
    sb.cfg.params.config = "does/not/exist.yaml".into();
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed { failed_steps: vec!["train".into()] });
    assert_eq!(report_exit_code(&report), EXIT_FLOW_FAILED);
    assert!(render_report(&report).contains("SubmissionError"));
    assert_eq!(current_version(&sb.cfg), None);
    assert!(!Path::new(&sb.cfg.manifest_dir).exists());
}

#[tokio::test]
async fn larger_is_better_appends_and_keeps_prior_version() {
    let mut sb = sandbox();
    sb.cfg.training.smaller_is_better = false;

    sb.cfg.training.value = 0.05;
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Deployed);
    let before = registry(&sb.cfg).versions(&sb.cfg.params.model_name).unwrap();
    assert_eq!(before.len(), 1);

    sb.cfg.training.value = 0.09;
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Deployed);
    let decision = report.decision.as_ref().unwrap();
    assert!(decision.promoted && !decision.smaller_is_better);
    assert_eq!(decision.previous_metric, Some(0.05));
    assert_eq!(report.deployment.as_ref().unwrap().model_version, 2);

    let after = registry(&sb.cfg).versions(&sb.cfg.params.model_name).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[0].version, 1);
    assert_eq!(after[0].checkpoint.metric("validation_loss"), Some(0.05));
    assert_eq!(after[1].version, 2);
    assert_eq!(after[1].checkpoint.metric("validation_loss"), Some(0.09));
}

#[tokio::test]
async fn without_simulate_training_goes_through_tracker_cli() {
    let mut sb = sandbox();
    sb.cfg.simulate = false;
    sb.cfg.tracker_bin = "/definitely/not/det".into();
    let report = run_with_registry(&sb.cfg, registry(&sb.cfg)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed { failed_steps: vec!["train".into()] });
    assert_eq!(report_exit_code(&report), EXIT_FLOW_FAILED);
    let rendered = render_report(&report);
    assert!(rendered.contains("SubmissionError") && rendered.contains("/definitely/not/det"), "{rendered}");
}
