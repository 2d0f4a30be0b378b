//! Subcomandos de la CLI y armado de colaboradores.
//!
//! La plataforma de entrenamiento es la CLI `det` contra el tracker
//! configurado, o la simulada con `--simulate`; el registro es Postgres
//! cuando hay `DATABASE_URL` y un archivo JSON en otro caso.
use std::sync::Arc;

use log::info;
use promo_adapters::fetchers::{GitCliFetcher, LocalDirFetcher};
use promo_adapters::memory::SimulatedJobPlatform;
use promo_adapters::registry::JsonFileModelRegistry;
use promo_adapters::serving::ManifestServingPlatform;
use promo_adapters::tracker::DeterminedCliPlatform;
use promo_adapters::{Collaborators, PipelineRunner, RunOutcome, RunReport};
use promo_domain::{JobPlatform, ModelRegistry, ModelVersion, SourceFetcher};
use promo_persistence::{build_dev_pool_from_env, DbConfig, PgEventStore, PgModelRegistry, PoolProvider};

use crate::config::PipelineConfig;
use crate::errors::{AppError, EXIT_FLOW_FAILED, EXIT_OK};

pub const USAGE: &str = "\
usage:
  promoflow run [--repo URL] [--branch B] [--config P] [--context P] [--tracker URL]
                [--model NAME] [--deployment NAME] [--namespace NS] [--image IMG]
                [--tracker-bin PATH] [--local-repo DIR] [--workspace-dir DIR]
                [--registry-file F] [--manifest-dir D] [--gateway URL]
                [--simulate [--metric V] [--metric-name N] [--larger-is-better]]
  promoflow models --model NAME [--registry-file F]";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Box<PipelineConfig>),
    Models { model: String, config: Box<PipelineConfig> },
    Help,
}

pub fn parse_command(args: &[String], mut base: PipelineConfig) -> Result<Command, AppError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(AppError::Usage("missing subcommand".into()));
    };
    match sub.as_str() {
        "run" => {
            base.apply_args(rest)?;
            Ok(Command::Run(Box::new(base)))
        }
        "models" => {
            let mut model = None;
            let mut it = rest.iter();
            while let Some(flag) = it.next() {
                let value = it.next()
                              .ok_or_else(|| AppError::Usage(format!("{flag} requires a value")))?;
                match flag.as_str() {
                    "--model" => model = Some(value.clone()),
                    "--registry-file" => base.registry_file = value.into(),
                    other => return Err(AppError::Usage(format!("unknown flag {other}"))),
                }
            }
            let model = model.ok_or_else(|| AppError::Usage("models requires --model".into()))?;
            Ok(Command::Models { model,
                                 config: Box::new(base) })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(AppError::Usage(format!("unknown subcommand {other}"))),
    }
}

fn pg_provider() -> Result<Option<PoolProvider>, AppError> {
    if !DbConfig::is_configured() {
        return Ok(None);
    }
    let pool = build_dev_pool_from_env()?;
    Ok(Some(PoolProvider { pool }))
}

/// Plataforma de entrenamiento: la simulada sólo si se pidió.
pub fn job_platform(cfg: &PipelineConfig) -> Arc<dyn JobPlatform> {
    if cfg.simulate {
        let t = &cfg.training;
        info!("using simulated training platform ({}={})", t.metric, t.value);
        Arc::new(SimulatedJobPlatform::completing_with(&t.metric, t.value, t.smaller_is_better).requiring_files())
    } else {
        info!("using tracker {} via {}", cfg.params.tracker_endpoint, cfg.tracker_bin.display());
        Arc::new(DeterminedCliPlatform::new(cfg.params.tracker_endpoint.clone()).with_binary(&cfg.tracker_bin))
    }
}

/// Colaboradores para una ejecución: fetcher según `local_repo`, plataforma
/// de entrenamiento según `simulate` y serving por manifiestos.
pub fn collaborators(cfg: &PipelineConfig, registry: Arc<dyn ModelRegistry>) -> Collaborators {
    let fetcher: Arc<dyn SourceFetcher> = match cfg.local_repo {
        Some(_) => Arc::new(LocalDirFetcher),
        None => Arc::new(GitCliFetcher::default()),
    };
    let jobs = job_platform(cfg);
    let serving = ManifestServingPlatform::new(&cfg.manifest_dir, cfg.gateway.clone());
    Collaborators::new(fetcher, jobs, registry, Arc::new(serving)).with_poll(cfg.poll)
}

fn runner(cfg: &PipelineConfig, registry: Arc<dyn ModelRegistry>) -> PipelineRunner {
    PipelineRunner::new(collaborators(cfg, registry), &cfg.workspace_dir).with_max_parallel(cfg.max_parallel)
}

fn effective_params(cfg: &PipelineConfig) -> promo_adapters::PipelineParams {
    let mut params = cfg.params.clone();
    if let Some(dir) = &cfg.local_repo {
        params.repo_url = dir.display().to_string();
    }
    params
}

/// Ejecuta el pipeline con un registro dado y event store en memoria.
pub async fn run_with_registry(cfg: &PipelineConfig, registry: Arc<dyn ModelRegistry>) -> Result<RunReport, AppError> {
    Ok(runner(cfg, registry).run(&effective_params(cfg)).await?)
}

pub async fn run_pipeline(cfg: &PipelineConfig) -> Result<RunReport, AppError> {
    match pg_provider()? {
        Some(provider) => {
            info!("using postgres event store and model registry");
            let registry = Arc::new(PgModelRegistry::new(provider.clone()));
            let report = runner(cfg, registry).run_with(&effective_params(cfg), PgEventStore::new(provider))
                                              .await?;
            Ok(report)
        }
        None => {
            info!("using model registry file {}", cfg.registry_file.display());
            run_with_registry(cfg, Arc::new(JsonFileModelRegistry::new(&cfg.registry_file))).await
        }
    }
}

pub fn list_versions(cfg: &PipelineConfig, model: &str) -> Result<Vec<ModelVersion>, AppError> {
    let versions = match pg_provider()? {
        Some(provider) => PgModelRegistry::new(provider).versions(model)?,
        None => JsonFileModelRegistry::new(&cfg.registry_file).versions(model)?,
    };
    Ok(versions)
}

pub fn render_report(report: &RunReport) -> String {
    let mut lines = vec![format!("flow {}", report.flow_id)];
    if let Some(d) = &report.decision {
        let previous = d.previous_metric.map_or_else(|| "none".to_string(), |m| m.to_string());
        lines.push(format!("decision: promoted={} outcome={:?} {}={} previous={}",
                           d.promoted, d.outcome, d.metric_name, d.candidate_metric, previous));
    }
    match &report.outcome {
        RunOutcome::Deployed => {
            if let Some(d) = &report.deployment {
                lines.push(format!("deployed {}/{} ({} v{}) at {}",
                                   d.namespace, d.name, d.model_name, d.model_version, d.endpoint));
            }
        }
        RunOutcome::NotDeployed => lines.push(report.notice.clone().unwrap_or_default()),
        RunOutcome::Failed { failed_steps } => {
            lines.push(format!("flow failed at {failed_steps:?}"));
            for (step, error) in &report.errors {
                lines.push(format!("  {step}: {error}"));
            }
        }
    }
    lines.join("\n")
}

pub fn report_exit_code(report: &RunReport) -> i32 {
    match report.outcome {
        RunOutcome::Failed { .. } => EXIT_FLOW_FAILED,
        RunOutcome::Deployed | RunOutcome::NotDeployed => EXIT_OK,
    }
}

/// Punto de entrada de la CLI; devuelve el código de salida.
pub async fn execute(args: &[String]) -> Result<i32, AppError> {
    let base = PipelineConfig::from_env()?;
    match parse_command(args, base)? {
        Command::Help => {
            println!("{USAGE}");
            Ok(EXIT_OK)
        }
        Command::Run(cfg) => {
            let report = run_pipeline(&cfg).await?;
            println!("{}", render_report(&report));
            Ok(report_exit_code(&report))
        }
        Command::Models { model, config } => {
            let versions = list_versions(&config, &model)?;
            if versions.is_empty() {
                println!("model '{model}' has no registered versions");
            }
            for v in versions {
                println!("{} v{} checkpoint={} registered_at={}",
                         v.model_name,
                         v.version,
                         v.checkpoint.uuid,
                         v.registered_at.to_rfc3339());
            }
            Ok(EXIT_OK)
        }
    }
}
