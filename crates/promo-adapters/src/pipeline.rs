//! Pipeline `train_and_deploy` y su runner.
//!
//! ```text
//! clone -> train -> extract-metric -> decide ─┬─ [Deploy: promoted == true]     deploy
//!                                             └─ [No-Deploy: promoted == false] no-deploy
//! ```
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use promo_core::{ArtifactSpec, ConditionGroup, CoreEngineError, EventStore, FlowDefinition, FlowEngine, FlowEvent,
                 FlowEventKind, InMemoryEventStore, InMemoryFlowRepository};
use promo_domain::{Deployment, JobPlatform, MetricExtractor, ModelRegistry, PromotionDecision, ServingPlatform,
                   SharedWorkspace, SourceFetcher};
use promo_policies::{ModelLocks, PromotionDecider};
use uuid::Uuid;

use crate::artifacts::{DeploymentArtifact, NotificationArtifact, PromotionArtifact};
use crate::injectors::PipelineParamsInjector;
use crate::steps::{CloneRepoStep, DecideStep, DeployStep, ExtractMetricStep, NoDeployStep, TrainStep, CLONE_STEP,
                   DECIDE_STEP, DEPLOY_STEP, EXTRACT_STEP, NO_DEPLOY_STEP, TRAIN_STEP};
use crate::{DeploymentTrigger, JobRunner, PipelineParams, PollPolicy};

pub const NOT_DEPLOYED_MESSAGE: &str = "Model Not Deployed -- Performance was not better than previous version";
pub const DEPLOY_GROUP: &str = "Deploy";
pub const NO_DEPLOY_GROUP: &str = "No-Deploy";
/// Clave booleana del output del gate.
pub const PROMOTED_KEY: &str = "promoted";

/// Sistemas externos con los que trabaja el pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub jobs: Arc<dyn JobPlatform>,
    pub registry: Arc<dyn ModelRegistry>,
    pub serving: Arc<dyn ServingPlatform>,
    pub poll: PollPolicy,
    pub locks: ModelLocks,
}

impl Collaborators {
    pub fn new(fetcher: Arc<dyn SourceFetcher>,
               jobs: Arc<dyn JobPlatform>,
               registry: Arc<dyn ModelRegistry>,
               serving: Arc<dyn ServingPlatform>)
               -> Self {
        Self { fetcher,
               jobs,
               registry,
               serving,
               poll: PollPolicy::default(),
               locks: ModelLocks::global() }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_locks(mut self, locks: ModelLocks) -> Self {
        self.locks = locks;
        self
    }
}

/// Arma el DAG del pipeline sobre un workspace ya creado.
pub fn train_and_deploy(workspace: Arc<SharedWorkspace>, c: &Collaborators) -> Result<FlowDefinition, CoreEngineError> {
    let decider = PromotionDecider::new(Arc::clone(&c.registry)).with_locks(c.locks.clone());
    let trigger = DeploymentTrigger::new(Arc::clone(&c.registry), Arc::clone(&c.serving));
    let train = TrainStep::new(JobRunner::new(Arc::clone(&c.jobs), c.poll), Arc::clone(&workspace));
    FlowDefinition::builder().step(Box::new(CloneRepoStep::new(Arc::clone(&c.fetcher), workspace)))
                             .step_after(Box::new(train), &[CLONE_STEP])
                             .step_after(Box::new(ExtractMetricStep::new(MetricExtractor::new(Arc::clone(&c.jobs)))),
                                         &[TRAIN_STEP])
                             .step_after(Box::new(DecideStep::new(Arc::new(decider))), &[EXTRACT_STEP])
                             .condition_group(ConditionGroup::new(DEPLOY_GROUP, DECIDE_STEP, PROMOTED_KEY, true),
                                              vec![(Box::new(DeployStep::new(trigger)), vec![])])
                             .condition_group(ConditionGroup::new(NO_DEPLOY_GROUP, DECIDE_STEP, PROMOTED_KEY, false),
                                              vec![(Box::new(NoDeployStep), vec![])])
                             .build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Deployed,
    NotDeployed,
    Failed { failed_steps: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub flow_id: Uuid,
    pub outcome: RunOutcome,
    pub decision: Option<PromotionDecision>,
    pub deployment: Option<Deployment>,
    pub notice: Option<String>,
    /// Errores de los steps fallidos, en orden del event log.
    pub errors: Vec<(String, CoreEngineError)>,
    pub events: Vec<FlowEvent>,
}

impl RunReport {
    pub fn endpoint(&self) -> Option<&str> {
        self.deployment.as_ref().map(|d| d.endpoint.as_str())
    }

    /// Steps que llegaron a ejecutarse (tienen `StepStarted`).
    pub fn started_steps(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                FlowEventKind::StepStarted { step_id, .. } => Some(step_id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Crea el workspace, ejecuta el DAG y lo desmonta al terminar.
pub struct PipelineRunner {
    collaborators: Collaborators,
    workspace_base: PathBuf,
    max_parallel: usize,
}

impl PipelineRunner {
    pub fn new(collaborators: Collaborators, workspace_base: impl Into<PathBuf>) -> Self {
        Self { collaborators,
               workspace_base: workspace_base.into(),
               max_parallel: promo_core::constants::DEFAULT_MAX_PARALLEL }
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Ejecuta con event store en memoria.
    pub async fn run(&self, params: &PipelineParams) -> Result<RunReport, CoreEngineError> {
        self.run_with(params, InMemoryEventStore::default()).await
    }

    /// Un flow fallido es un `Ok` con `RunOutcome::Failed`; `Err` queda para
    /// fallos del propio motor (definición inválida, storage).
    pub async fn run_with<E: EventStore>(&self, params: &PipelineParams, event_store: E) -> Result<RunReport, CoreEngineError> {
        let workspace =
            Arc::new(SharedWorkspace::create(&self.workspace_base).map_err(|e| CoreEngineError::Internal(e.to_string()))?);
        let definition = train_and_deploy(Arc::clone(&workspace), &self.collaborators)?;
        let mut engine = FlowEngine::builder(event_store, InMemoryFlowRepository::new()).definition(definition)
                                                                                       .injector(Box::new(PipelineParamsInjector::new(params)))
                                                                                       .max_parallel(self.max_parallel)
                                                                                       .build();
        let flow_id = engine.ensure_default_flow_id();
        info!("flow {flow_id}: train_and_deploy for model '{}'", params.model_name);
        let result = engine.run().await;

        if let Err(e) = workspace.teardown() {
            warn!("flow {flow_id}: {e}");
        }

        let failed_steps = match result {
            Ok(_) => None,
            Err(CoreEngineError::FlowFailed { failed_steps }) => Some(failed_steps),
            Err(e) => return Err(e),
        };
        let events = engine.events_for(flow_id)?;
        let errors = events.iter()
                           .filter_map(|e| match &e.kind {
                               FlowEventKind::StepFailed { step_id, error, .. } => Some((step_id.clone(), error.clone())),
                               _ => None,
                           })
                           .collect();
        let decision = engine.artifact_for(DECIDE_STEP)
                             .and_then(|a| PromotionArtifact::from_artifact(&a).ok())
                             .map(PromotionDecision::from);
        let deployment = engine.artifact_for(DEPLOY_STEP)
                               .and_then(|a| DeploymentArtifact::from_artifact(&a).ok())
                               .map(Deployment::from);
        let notice = engine.artifact_for(NO_DEPLOY_STEP)
                           .and_then(|a| NotificationArtifact::from_artifact(&a).ok())
                           .map(|n| n.message);
        let outcome = match (failed_steps, &deployment) {
            (Some(failed_steps), _) => RunOutcome::Failed { failed_steps },
            (None, Some(_)) => RunOutcome::Deployed,
            (None, None) => RunOutcome::NotDeployed,
        };
        info!("flow {flow_id}: outcome {outcome:?}");
        Ok(RunReport { flow_id,
                       outcome,
                       decision,
                       deployment,
                       notice,
                       errors,
                       events })
    }
}
