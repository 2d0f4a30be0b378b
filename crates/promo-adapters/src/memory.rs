//! Implementaciones en memoria de los sistemas externos.
//!
//! Se usan en tests y en el modo simulado de la CLI: la plataforma de
//! entrenamiento real es un colaborador externo.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use promo_domain::{Checkpoint, Deployment, DeploymentRequest, JobId, JobPlatform, JobSpec, JobState, Model, ModelLookup,
                   ModelRegistry, ModelVersion, PipelineError, RepoRef, ServingPlatform, SharedWorkspace, SourceFetcher};
use serde_json::{json, Value};

use crate::fetchers::ensure_empty_target;
use crate::registry::ModelEntry;
use crate::serving::prediction_endpoint;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Default)]
pub struct InMemoryModelRegistry {
    models: Mutex<BTreeMap<String, ModelEntry>>,
}

impl InMemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelRegistry for InMemoryModelRegistry {
    fn lookup(&self, name: &str) -> Result<ModelLookup, PipelineError> {
        Ok(lock(&self.models).get(name).map(ModelEntry::lookup).unwrap_or(ModelLookup::NotFound))
    }

    fn create_model(&self, name: &str) -> Result<Model, PipelineError> {
        let mut models = lock(&self.models);
        let entry = models.entry(name.to_string()).or_insert_with(|| ModelEntry { model: Model { name: name.to_string(),
                                                                                                 created_at: Utc::now() },
                                                                                   versions: Vec::new() });
        Ok(entry.model.clone())
    }

    fn register_version(&self, name: &str, checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError> {
        lock(&self.models).get_mut(name)
                          .map(|e| e.append(checkpoint))
                          .ok_or_else(|| PipelineError::ModelRegistryUnavailable(format!("model '{name}' does not exist")))
    }

    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>, PipelineError> {
        Ok(lock(&self.models).get(name).map(|e| e.versions.clone()).unwrap_or_default())
    }
}

/// Registro que siempre falla (registro inaccesible).
#[derive(Debug, Default)]
pub struct UnavailableModelRegistry;

impl ModelRegistry for UnavailableModelRegistry {
    fn lookup(&self, _name: &str) -> Result<ModelLookup, PipelineError> {
        Err(PipelineError::ModelRegistryUnavailable("registry offline".into()))
    }

    fn create_model(&self, _name: &str) -> Result<Model, PipelineError> {
        Err(PipelineError::ModelRegistryUnavailable("registry offline".into()))
    }

    fn register_version(&self, _name: &str, _checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError> {
        Err(PipelineError::ModelRegistryUnavailable("registry offline".into()))
    }

    fn versions(&self, _name: &str) -> Result<Vec<ModelVersion>, PipelineError> {
        Err(PipelineError::ModelRegistryUnavailable("registry offline".into()))
    }
}

/// Checkpoint con la métrica bajo `validation_metrics` y el searcher
/// correspondiente en la configuración del experimento.
pub fn checkpoint_with_metric(uuid: &str, job: &JobId, metric: &str, value: f64, smaller_is_better: bool) -> Checkpoint {
    Checkpoint { uuid: uuid.to_string(),
                 job_id: job.clone(),
                 metrics: json!({ "validation_metrics": { metric: value } }),
                 experiment_config: json!({ "searcher": { "metric": metric, "smaller_is_better": smaller_is_better } }) }
}

/// Plataforma de jobs guionada.
///
/// Cada job recorre la secuencia de estados configurada (el último estado se
/// repite) y su mejor checkpoint expone `metrics`/`experiment_config`.
#[derive(Debug)]
pub struct SimulatedJobPlatform {
    states: Vec<JobState>,
    metrics: Value,
    experiment_config: Value,
    reject_submission: Option<String>,
    require_files: bool,
    next_id: AtomicU64,
    progress: Mutex<HashMap<JobId, VecDeque<JobState>>>,
    submitted: Mutex<Vec<JobSpec>>,
    polls: AtomicU64,
}

impl SimulatedJobPlatform {
    /// Jobs que terminan bien con la métrica indicada.
    pub fn completing_with(metric: &str, value: f64, smaller_is_better: bool) -> Self {
        Self { states: vec![JobState::Created, JobState::Running, JobState::Completed],
               metrics: json!({ "validation_metrics": { metric: value } }),
               experiment_config: json!({ "searcher": { "metric": metric, "smaller_is_better": smaller_is_better } }),
               reject_submission: None,
               require_files: false,
               next_id: AtomicU64::new(1),
               progress: Mutex::new(HashMap::new()),
               submitted: Mutex::new(Vec::new()),
               polls: AtomicU64::new(0) }
    }

    /// Reemplaza la secuencia de estados que recorre cada job.
    pub fn with_states(mut self, states: Vec<JobState>) -> Self {
        self.states = states;
        self
    }

    /// Documento de métricas crudo del checkpoint.
    pub fn with_metrics_document(mut self, metrics: Value) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn rejecting_submissions(mut self, reason: impl Into<String>) -> Self {
        self.reject_submission = Some(reason.into());
        self
    }

    /// Exige que config y context existan al enviar.
    pub fn requiring_files(mut self) -> Self {
        self.require_files = true;
        self
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        lock(&self.submitted).clone()
    }

    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobPlatform for SimulatedJobPlatform {
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, PipelineError> {
        if let Some(reason) = &self.reject_submission {
            return Err(PipelineError::Submission(reason.clone()));
        }
        if self.require_files {
            for p in [&spec.config_path, &spec.context_path] {
                if !tokio::fs::try_exists(p).await.unwrap_or(false) {
                    return Err(PipelineError::Submission(format!("{} does not exist", p.display())));
                }
            }
        }
        let job = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst).to_string());
        lock(&self.progress).insert(job.clone(), self.states.iter().copied().collect());
        lock(&self.submitted).push(spec.clone());
        debug!("simulated job {job} accepted");
        Ok(job)
    }

    async fn state(&self, job: &JobId) -> Result<JobState, PipelineError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut progress = lock(&self.progress);
        let queue = progress.get_mut(job)
                            .ok_or_else(|| PipelineError::JobStatusUnavailable(format!("unknown job {job}")))?;
        let state = if queue.len() > 1 { queue.pop_front() } else { queue.front().copied() };
        state.ok_or_else(|| PipelineError::JobStatusUnavailable(format!("job {job} has no state")))
    }

    async fn top_checkpoint(&self, job: &JobId) -> Result<Checkpoint, PipelineError> {
        if !lock(&self.progress).contains_key(job) {
            return Err(PipelineError::JobStatusUnavailable(format!("unknown job {job}")));
        }
        Ok(Checkpoint { uuid: format!("ckpt-{job}"),
                        job_id: job.clone(),
                        metrics: self.metrics.clone(),
                        experiment_config: self.experiment_config.clone() })
    }
}

/// Fetcher que escribe archivos fijos en `<workspace>/mlrepo`.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    files: BTreeMap<PathBuf, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, relative: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(relative.into(), content.into());
        self
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, repo: &RepoRef, workspace: &SharedWorkspace) -> Result<PathBuf, PipelineError> {
        let target = workspace.repo_dir();
        ensure_empty_target(&target)?;
        debug!("materialising {} static files for {}@{}", self.files.len(), repo.url, repo.branch);
        tokio::fs::create_dir_all(&target).await
                                          .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        for (rel, content) in &self.files {
            let path = target.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await
                                                 .map_err(|e| PipelineError::Fetch(e.to_string()))?;
            }
            tokio::fs::write(&path, content).await
                                            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        }
        Ok(target)
    }
}

/// Fetcher que siempre falla.
#[derive(Debug, Clone)]
pub struct FailingFetcher(pub String);

#[async_trait]
impl SourceFetcher for FailingFetcher {
    async fn fetch(&self, _repo: &RepoRef, _workspace: &SharedWorkspace) -> Result<PathBuf, PipelineError> {
        Err(PipelineError::Fetch(self.0.clone()))
    }
}

/// Plataforma de serving que registra los deployments aplicados.
#[derive(Debug)]
pub struct InMemoryServingPlatform {
    gateway: String,
    deployments: Mutex<BTreeMap<(String, String), Deployment>>,
    reject: Option<String>,
}

impl Default for InMemoryServingPlatform {
    fn default() -> Self {
        Self { gateway: "http://serving.local".into(),
               deployments: Mutex::new(BTreeMap::new()),
               reject: None }
    }
}

impl InMemoryServingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self { reject: Some(reason.into()),
               ..Self::default() }
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        lock(&self.deployments).values().cloned().collect()
    }
}

#[async_trait]
impl ServingPlatform for InMemoryServingPlatform {
    async fn apply_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, PipelineError> {
        if let Some(reason) = &self.reject {
            return Err(PipelineError::Deployment(reason.clone()));
        }
        let key = (request.namespace.clone(), request.name.clone());
        let mut deployments = lock(&self.deployments);
        let created = !deployments.contains_key(&key);
        let d = Deployment { name: request.name.clone(),
                             namespace: request.namespace.clone(),
                             model_name: request.model_name.clone(),
                             model_version: request.model_version,
                             serving_image: request.serving_image.clone(),
                             endpoint: prediction_endpoint(&self.gateway, &request.namespace, &request.name),
                             created };
        deployments.insert(key, d.clone());
        Ok(d)
    }
}
