//! Configuración de la aplicación.
//!
//! `PipelineConfig::from_env()` carga `.env` una sola vez y lee las variables
//! `PROMOFLOW_*`; los flags de la CLI (`apply_args`) tienen prioridad.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use promo_adapters::{PipelineParams, PollPolicy};

use crate::errors::AppError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

/// Métrica que reporta la plataforma de entrenamiento simulada.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTraining {
    pub metric: String,
    pub value: f64,
    pub smaller_is_better: bool,
}

impl Default for SimulatedTraining {
    fn default() -> Self {
        Self { metric: "validation_loss".into(),
               value: 0.05,
               smaller_is_better: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub params: PipelineParams,
    /// Directorio base donde se crea el workspace de cada ejecución.
    pub workspace_dir: PathBuf,
    /// Si está, el código se copia desde este directorio en vez de `git clone`.
    pub local_repo: Option<PathBuf>,
    /// Registro JSON usado cuando no hay `DATABASE_URL`.
    pub registry_file: PathBuf,
    pub manifest_dir: PathBuf,
    pub gateway: String,
    /// Usa la plataforma de entrenamiento simulada en vez de la CLI `det`.
    pub simulate: bool,
    /// Binario de la CLI del tracker.
    pub tracker_bin: PathBuf,
    pub training: SimulatedTraining,
    pub poll: PollPolicy,
    pub max_parallel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { params: PipelineParams::default(),
               workspace_dir: env::temp_dir(),
               local_repo: None,
               registry_file: PathBuf::from("promoflow-registry.json"),
               manifest_dir: PathBuf::from("deployments"),
               gateway: "http://localhost:8003".into(),
               simulate: false,
               tracker_bin: PathBuf::from("det"),
               training: SimulatedTraining::default(),
               poll: PollPolicy::default(),
               max_parallel: promo_core::constants::DEFAULT_MAX_PARALLEL }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.parse().map_err(|_| AppError::Config(format!("{key}: invalid value '{raw}'")))
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut cfg = Self::default();
        let p = &mut cfg.params;
        for (key, slot) in [("PROMOFLOW_REPO_URL", &mut p.repo_url),
                            ("PROMOFLOW_BRANCH", &mut p.branch),
                            ("PROMOFLOW_CONFIG", &mut p.config),
                            ("PROMOFLOW_CONTEXT", &mut p.context),
                            ("PROMOFLOW_TRACKER_ENDPOINT", &mut p.tracker_endpoint),
                            ("PROMOFLOW_MODEL_NAME", &mut p.model_name),
                            ("PROMOFLOW_DEPLOYMENT_NAME", &mut p.deployment_name),
                            ("PROMOFLOW_NAMESPACE", &mut p.deployment_namespace),
                            ("PROMOFLOW_SERVING_IMAGE", &mut p.serving_image),
                            ("PROMOFLOW_GATEWAY", &mut cfg.gateway)]
        {
            if let Some(v) = get(key) {
                *slot = v;
            }
        }
        if let Some(v) = get("PROMOFLOW_WORKSPACE_DIR") {
            cfg.workspace_dir = v.into();
        }
        if let Some(v) = get("PROMOFLOW_LOCAL_REPO") {
            cfg.local_repo = Some(v.into());
        }
        if let Some(v) = get("PROMOFLOW_REGISTRY_FILE") {
            cfg.registry_file = v.into();
        }
        if let Some(v) = get("PROMOFLOW_MANIFEST_DIR") {
            cfg.manifest_dir = v.into();
        }
        if let Some(v) = get("PROMOFLOW_SIMULATE") {
            cfg.simulate = parse("PROMOFLOW_SIMULATE", &v)?;
        }
        if let Some(v) = get("PROMOFLOW_TRACKER_BIN") {
            cfg.tracker_bin = v.into();
        }
        if let Some(v) = get("PROMOFLOW_SIM_METRIC") {
            cfg.training.metric = v;
        }
        if let Some(v) = get("PROMOFLOW_SIM_VALUE") {
            cfg.training.value = parse("PROMOFLOW_SIM_VALUE", &v)?;
        }
        if let Some(v) = get("PROMOFLOW_SIM_SMALLER_IS_BETTER") {
            cfg.training.smaller_is_better = parse("PROMOFLOW_SIM_SMALLER_IS_BETTER", &v)?;
        }
        if let Some(v) = get("PROMOFLOW_POLL_INTERVAL_MS") {
            let ms: u64 = parse("PROMOFLOW_POLL_INTERVAL_MS", &v)?;
            if ms == 0 {
                return Err(AppError::Config("PROMOFLOW_POLL_INTERVAL_MS: must be at least 1".into()));
            }
            cfg.poll.interval = Duration::from_millis(ms);
        }
        if let Some(v) = get("PROMOFLOW_MAX_WAIT_SECS") {
            cfg.poll.max_wait = Duration::from_secs(parse("PROMOFLOW_MAX_WAIT_SECS", &v)?);
        }
        if let Some(v) = get("PROMOFLOW_MAX_PARALLEL") {
            cfg.max_parallel = parse::<usize>("PROMOFLOW_MAX_PARALLEL", &v)?.max(1);
        }
        Ok(cfg)
    }

    /// Aplica los flags de `promoflow run`.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), AppError> {
        let mut it = args.iter();
        while let Some(flag) = it.next() {
            match flag.as_str() {
                "--larger-is-better" => {
                    self.training.smaller_is_better = false;
                    continue;
                }
                "--simulate" => {
                    self.simulate = true;
                    continue;
                }
                _ => {}
            }
            let value = it.next()
                          .ok_or_else(|| AppError::Usage(format!("{flag} requires a value")))?
                          .clone();
            match flag.as_str() {
                "--repo" => self.params.repo_url = value,
                "--branch" => self.params.branch = value,
                "--config" => self.params.config = value,
                "--context" => self.params.context = value,
                "--tracker" => self.params.tracker_endpoint = value,
                "--model" => self.params.model_name = value,
                "--deployment" => self.params.deployment_name = value,
                "--namespace" => self.params.deployment_namespace = value,
                "--image" => self.params.serving_image = value,
                "--local-repo" => self.local_repo = Some(value.into()),
                "--workspace-dir" => self.workspace_dir = value.into(),
                "--registry-file" => self.registry_file = value.into(),
                "--manifest-dir" => self.manifest_dir = value.into(),
                "--gateway" => self.gateway = value,
                "--tracker-bin" => self.tracker_bin = value.into(),
                "--metric-name" => self.training.metric = value,
                "--metric" => {
                    self.training.value = value.parse()
                                               .map_err(|_| AppError::Usage(format!("--metric: not a number: {value}")))?
                }
                other => return Err(AppError::Usage(format!("unknown flag {other}"))),
            }
        }
        Ok(())
    }
}
