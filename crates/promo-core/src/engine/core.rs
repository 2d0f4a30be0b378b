//! Implementación del `FlowEngine`.
//!
//! Cada llamada a `next_with` ejecuta una "ola": reconstruye el estado por
//! replay, registra los steps que ya no pueden correr (`StepSkipped`), lanza
//! en paralelo todos los steps `Ready` y agrega sus resultados al event log
//! en orden topológico. Cuando todos los steps son terminales se cierra el
//! flow con `FlowCompleted` o `FlowFailed`.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::constants::{DEFAULT_MAX_PARALLEL, ENGINE_VERSION};
use crate::engine::EngineBuilderInit;
use crate::errors::CoreEngineError;
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::hashing::hash_value;
use crate::injection::{CompositeInjector, ParamInjector};
use crate::model::{Artifact, ExecutionContext};
use crate::repo::{FlowDefinition, FlowInstance, FlowRepository, InMemoryFlowRepository};
use crate::step::{SkipReason, StepRunResult, StepSignal, StepStatus};

/// Motor de ejecución de flujos DAG deterministas.
#[derive(Debug)]
pub struct FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    event_store: E,
    repository: R,
    artifact_store: HashMap<String, Artifact>,
    injectors: Vec<Box<dyn ParamInjector>>,
    max_parallel: usize,
    default_flow_id: Option<Uuid>,
    default_definition: Option<Arc<FlowDefinition>>,
}

/// Step listo para lanzarse en la ola actual.
struct Prepared {
    index: usize,
    ctx: ExecutionContext,
    input_hashes: BTreeMap<String, String>,
}

impl FlowEngine<InMemoryEventStore, InMemoryFlowRepository> {
    /// Builder con stores en memoria.
    #[inline]
    pub fn new() -> EngineBuilderInit<InMemoryEventStore, InMemoryFlowRepository> {
        EngineBuilderInit { event_store: InMemoryEventStore::default(),
                            repository: InMemoryFlowRepository::new() }
    }
}

impl<E, R> FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    #[inline]
    pub fn builder(event_store: E, repository: R) -> EngineBuilderInit<E, R> {
        EngineBuilderInit { event_store, repository }
    }

    pub fn new_with_stores(event_store: E, repository: R) -> Self {
        Self { event_store,
               repository,
               artifact_store: HashMap::new(),
               injectors: Vec::new(),
               max_parallel: DEFAULT_MAX_PARALLEL,
               default_flow_id: None,
               default_definition: None }
    }

    pub fn add_injector(&mut self, injector: Box<dyn ParamInjector>) {
        self.injectors.push(injector);
    }

    pub fn set_max_parallel(&mut self, n: usize) {
        self.max_parallel = n.max(1);
    }

    pub fn set_default_definition(&mut self, definition: Arc<FlowDefinition>) {
        self.default_definition = Some(definition);
    }

    pub fn definition(&self) -> Option<&FlowDefinition> {
        self.default_definition.as_deref()
    }

    /// Define/genera un `flow_id` por defecto si no existe aún y lo retorna.
    pub fn ensure_default_flow_id(&mut self) -> Uuid {
        *self.default_flow_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn set_default_flow_id(&mut self, flow_id: Uuid) {
        self.default_flow_id = Some(flow_id);
    }

    pub fn default_flow_id(&self) -> Option<Uuid> {
        self.default_flow_id
    }

    pub fn get_artifact(&self, hash: &str) -> Option<&Artifact> {
        self.artifact_store.get(hash)
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    /// Ejecuta el flujo por defecto hasta cerrarlo.
    ///
    /// `Ok(flow_id)` si todos los steps alcanzables terminaron bien;
    /// `Err(FlowFailed)` si alguno falló.
    pub async fn run(&mut self) -> Result<Uuid, CoreEngineError> {
        let flow_id = self.ensure_default_flow_id();
        let def = self.require_definition()?;
        self.run_flow(flow_id, &def).await
    }

    /// Ejecuta un flujo específico hasta su cierre.
    pub async fn run_flow(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<Uuid, CoreEngineError> {
        loop {
            match self.next_with(flow_id, definition).await {
                Ok(()) => continue,
                Err(CoreEngineError::FlowCompleted) => return Ok(flow_id),
                Err(e) => return Err(e),
            }
        }
    }

    /// Ejecuta una ola del flujo por defecto.
    pub async fn next(&mut self) -> Result<(), CoreEngineError> {
        let flow_id = self.ensure_default_flow_id();
        let def = self.require_definition()?;
        self.next_with(flow_id, &def).await
    }

    fn require_definition(&self) -> Result<Arc<FlowDefinition>, CoreEngineError> {
        self.default_definition
            .clone()
            .ok_or_else(|| CoreEngineError::Internal("no default definition configured".into()))
    }

    /// Ejecuta una ola. Devuelve `Err(FlowCompleted)` / `Err(FlowFailed)` una
    /// vez que el flow quedó cerrado.
    pub async fn next_with(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<(), CoreEngineError> {
        let events = self.load_or_init(flow_id, definition)?;
        let instance = self.repository.load(flow_id, &events, definition);

        if instance.completed {
            return Err(CoreEngineError::FlowCompleted);
        }
        if instance.failed {
            return Err(CoreEngineError::FlowFailed { failed_steps: instance.failed_steps() });
        }

        let mut statuses: Vec<StepStatus> = instance.steps.iter().map(|s| s.status.clone()).collect();
        for &idx in definition.topological_order() {
            if !matches!(statuses[idx], StepStatus::Pending) {
                continue;
            }
            if let Some(reason) = skip_reason(definition, &instance, &statuses, idx) {
                let step_id = instance.steps[idx].step_id.clone();
                debug!("flow {flow_id}: step '{step_id}' skipped ({reason:?})");
                self.event_store.append_kind(flow_id,
                                             FlowEventKind::StepSkipped { step_index: idx,
                                                                          step_id,
                                                                          reason: reason.clone() })?;
                statuses[idx] = StepStatus::Skipped(reason);
            }
        }

        let ready: Vec<usize> = definition.topological_order()
                                          .iter()
                                          .copied()
                                          .filter(|i| matches!(statuses[*i], StepStatus::Ready | StepStatus::Running))
                                          .collect();

        if ready.is_empty() {
            return self.close_flow(flow_id, definition, &instance, &statuses);
        }

        let mut prepared = Vec::with_capacity(ready.len());
        for idx in ready {
            match self.prepare(flow_id, definition, &instance, idx) {
                Ok(p) => prepared.push(p),
                Err(error) => {
                    let step_id = instance.steps[idx].step_id.clone();
                    self.event_store.append_kind(flow_id,
                                                 FlowEventKind::StepStarted { step_index: idx,
                                                                              step_id: step_id.clone() })?;
                    self.record_failure(flow_id, definition, idx, &step_id, &Value::Null, &BTreeMap::new(), error)?;
                }
            }
        }

        for p in &prepared {
            info!("flow {flow_id}: starting step '{}'", p.ctx.step_id);
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StepStarted { step_index: p.index,
                                                                      step_id: p.ctx.step_id.clone() })?;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(prepared.len());
        for p in &prepared {
            let Some(node) = definition.node(p.index) else {
                return Err(CoreEngineError::Internal(format!("step index {} out of range", p.index)));
            };
            let step = Arc::clone(&node.step);
            let ctx = p.ctx.clone();
            let sem = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                                          let _permit = sem.acquire_owned().await.ok();
                                          step.run(&ctx).await
                                      }));
        }

        for (p, handle) in prepared.into_iter().zip(handles) {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => StepRunResult::Failure { error: CoreEngineError::Internal(format!("step task aborted: {e}")) },
            };
            self.record_result(flow_id, definition, p, result)?;
        }
        Ok(())
    }

    /// Asegura el evento `FlowInitialized` y devuelve los eventos actuales.
    fn load_or_init(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<Vec<FlowEvent>, CoreEngineError> {
        let mut events = self.event_store.list(flow_id)?;
        let has_init = events.iter().any(|e| matches!(e.kind, FlowEventKind::FlowInitialized { .. }));
        if !has_init {
            let ev = self.event_store
                         .append_kind(flow_id,
                                      FlowEventKind::FlowInitialized { definition_hash: definition.definition_hash.clone(),
                                                                       step_count: definition.len() })?;
            events.push(ev);
        }
        Ok(events)
    }

    fn prepare(&self,
               flow_id: Uuid,
               definition: &FlowDefinition,
               instance: &FlowInstance,
               idx: usize)
               -> Result<Prepared, CoreEngineError> {
        let node = definition.node(idx)
                             .ok_or_else(|| CoreEngineError::Internal(format!("step index {idx} out of range")))?;
        let mut inputs = BTreeMap::new();
        let mut input_hashes = BTreeMap::new();
        let mut input = None;
        for (pos, d) in definition.dependencies(idx).iter().enumerate() {
            let slot = &instance.steps[*d];
            let Some(hash) = slot.outputs.first() else {
                continue;
            };
            let artifact = self.artifact_store.get(hash).cloned().ok_or(CoreEngineError::MissingInputs)?;
            if pos == 0 {
                input = Some(artifact.clone());
            }
            input_hashes.insert(slot.step_id.clone(), hash.clone());
            inputs.insert(slot.step_id.clone(), artifact);
        }
        let base = node.step.base_params();
        let mut ctx = ExecutionContext { flow_id,
                                         step_id: node.id().to_string(),
                                         input,
                                         inputs,
                                         params: Value::Null };
        ctx.params = CompositeInjector::apply_injectors(&self.injectors, &base, &ctx);
        Ok(Prepared { index: idx,
                      ctx,
                      input_hashes })
    }

    fn record_result(&mut self,
                     flow_id: Uuid,
                     definition: &FlowDefinition,
                     p: Prepared,
                     result: StepRunResult)
                     -> Result<(), CoreEngineError> {
        let (mut outputs, signals) = match result {
            StepRunResult::Success { outputs } => (outputs, Vec::new()),
            StepRunResult::SuccessWithSignals { outputs, signals } => (outputs, signals),
            StepRunResult::Failure { error } => {
                return self.record_failure(flow_id,
                                           definition,
                                           p.index,
                                           &p.ctx.step_id,
                                           &p.ctx.params,
                                           &p.input_hashes,
                                           error);
            }
        };

        // Un gate debe exponer el booleano de cada grupo que controla.
        let mut selections: Vec<(String, bool)> = Vec::new();
        for group in definition.groups_gated_by(&p.ctx.step_id) {
            if selections.iter().any(|(k, _)| *k == group.key) {
                continue;
            }
            match outputs.first().and_then(|a| a.bool_field(&group.key)) {
                Some(v) => selections.push((group.key.clone(), v)),
                None => {
                    let error = CoreEngineError::GateOutputNotBoolean { gate: p.ctx.step_id.clone(),
                                                                        key: group.key.clone() };
                    return self.record_failure(flow_id,
                                               definition,
                                               p.index,
                                               &p.ctx.step_id,
                                               &p.ctx.params,
                                               &p.input_hashes,
                                               error);
                }
            }
        }

        let output_hashes = self.hash_and_store_outputs(&mut outputs);
        for StepSignal { signal, data } in signals {
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StepSignal { step_index: p.index,
                                                                     step_id: p.ctx.step_id.clone(),
                                                                     signal,
                                                                     data })?;
        }
        let fingerprint = step_fingerprint(definition, &p.ctx.step_id, &p.ctx.params, &p.input_hashes, &output_hashes);
        info!("flow {flow_id}: step '{}' succeeded", p.ctx.step_id);
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepFinished { step_index: p.index,
                                                                   step_id: p.ctx.step_id.clone(),
                                                                   outputs: output_hashes,
                                                                   fingerprint })?;
        for (key, value) in selections {
            info!("flow {flow_id}: gate '{}' selected {key}={value}", p.ctx.step_id);
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::BranchSelected { gate_id: p.ctx.step_id.clone(),
                                                                         key,
                                                                         value })?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_failure(&mut self,
                      flow_id: Uuid,
                      definition: &FlowDefinition,
                      index: usize,
                      step_id: &str,
                      params: &Value,
                      input_hashes: &BTreeMap<String, String>,
                      error: CoreEngineError)
                      -> Result<(), CoreEngineError> {
        warn!("flow {flow_id}: step '{step_id}' failed: {error}");
        let fingerprint = step_fingerprint(definition, step_id, params, input_hashes, &[]);
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepFailed { step_index: index,
                                                                 step_id: step_id.to_string(),
                                                                 error,
                                                                 fingerprint })?;
        Ok(())
    }

    fn hash_and_store_outputs(&mut self, outputs: &mut [Artifact]) -> Vec<String> {
        let mut hashes = Vec::with_capacity(outputs.len());
        for o in outputs.iter_mut() {
            o.hash = hash_value(&o.payload);
            hashes.push(o.hash.clone());
            self.artifact_store.insert(o.hash.clone(), o.clone());
        }
        hashes
    }

    fn close_flow(&mut self,
                  flow_id: Uuid,
                  definition: &FlowDefinition,
                  instance: &FlowInstance,
                  statuses: &[StepStatus])
                  -> Result<(), CoreEngineError> {
        if !statuses.iter().all(StepStatus::is_terminal) {
            return Err(CoreEngineError::Internal("no runnable steps but flow is not terminal".into()));
        }
        let failed_steps: Vec<String> = statuses.iter()
                                                .enumerate()
                                                .filter(|(_, s)| matches!(s, StepStatus::Failed))
                                                .map(|(i, _)| instance.steps[i].step_id.clone())
                                                .collect();
        if !failed_steps.is_empty() {
            warn!("flow {flow_id} failed: {failed_steps:?}");
            self.event_store
                .append_kind(flow_id, FlowEventKind::FlowFailed { failed_steps: failed_steps.clone() })?;
            return Err(CoreEngineError::FlowFailed { failed_steps });
        }
        let step_fps: Vec<&str> = definition.topological_order()
                                            .iter()
                                            .filter(|i| matches!(statuses[**i], StepStatus::Succeeded))
                                            .filter_map(|i| instance.steps[*i].fingerprint.as_deref())
                                            .collect();
        let flow_fingerprint = hash_value(&json!({
            "engine_version": ENGINE_VERSION,
            "definition_hash": definition.definition_hash,
            "step_fingerprints": step_fps,
        }));
        info!("flow {flow_id} completed");
        self.event_store.append_kind(flow_id, FlowEventKind::FlowCompleted { flow_fingerprint })?;
        Err(CoreEngineError::FlowCompleted)
    }

    /// Eventos de un flow.
    pub fn events_for(&self, flow_id: Uuid) -> Result<Vec<FlowEvent>, CoreEngineError> {
        self.event_store.list(flow_id)
    }

    /// Eventos del flujo por defecto.
    pub fn events(&self) -> Option<Vec<FlowEvent>> {
        self.default_flow_id.and_then(|fid| self.event_store.list(fid).ok())
    }

    /// Estado reconstruido de un flow.
    pub fn instance(&self, flow_id: Uuid, definition: &FlowDefinition) -> Result<FlowInstance, CoreEngineError> {
        let events = self.event_store.list(flow_id)?;
        Ok(self.repository.load(flow_id, &events, definition))
    }

    /// Output principal de un step ya ejecutado en el flujo por defecto.
    pub fn artifact_for(&self, step_id: &str) -> Option<Artifact> {
        let def = self.default_definition.as_ref()?;
        let flow_id = self.default_flow_id?;
        let instance = self.instance(flow_id, def).ok()?;
        let hash = instance.slot(step_id)?.outputs.first()?;
        self.artifact_store.get(hash).cloned()
    }

    /// Variante compacta de eventos para el flujo por defecto.
    pub fn event_variants(&self) -> Option<Vec<&'static str>> {
        self.events().map(|events| {
                         events.iter()
                               .map(|e| match e.kind {
                                   FlowEventKind::FlowInitialized { .. } => "I",
                                   FlowEventKind::StepStarted { .. } => "S",
                                   FlowEventKind::StepFinished { .. } => "F",
                                   FlowEventKind::StepFailed { .. } => "X",
                                   FlowEventKind::StepSkipped { .. } => "K",
                                   FlowEventKind::StepSignal { .. } => "G",
                                   FlowEventKind::BranchSelected { .. } => "B",
                                   FlowEventKind::FlowCompleted { .. } => "C",
                                   FlowEventKind::FlowFailed { .. } => "Z",
                               })
                               .collect()
                     })
    }

    /// Fingerprint del flujo por defecto si está cerrado con éxito.
    pub fn flow_fingerprint(&self) -> Option<String> {
        let evs = self.events()?;
        evs.iter().rev().find_map(|e| match &e.kind {
                            FlowEventKind::FlowCompleted { flow_fingerprint } => Some(flow_fingerprint.clone()),
                            _ => None,
                        })
    }
}

/// Motivo por el que un step pendiente ya no puede ejecutarse, si alguno.
fn skip_reason(definition: &FlowDefinition,
               instance: &FlowInstance,
               statuses: &[StepStatus],
               idx: usize)
               -> Option<SkipReason> {
    for d in definition.dependencies(idx) {
        let step_id = instance.steps[*d].step_id.clone();
        match statuses[*d] {
            StepStatus::Failed => return Some(SkipReason::UpstreamFailed { step_id }),
            StepStatus::Skipped(_) => return Some(SkipReason::UpstreamSkipped { step_id }),
            _ => {}
        }
    }
    let group = definition.group_of(idx)?;
    match instance.branch(&group.gate, &group.key) {
        Some(v) if v != group.equals => Some(SkipReason::BranchNotTaken { group: group.name.clone(),
                                                                          gate: group.gate.clone() }),
        _ => None,
    }
}

fn step_fingerprint(definition: &FlowDefinition,
                    step_id: &str,
                    params: &Value,
                    input_hashes: &BTreeMap<String, String>,
                    output_hashes: &[String])
                    -> String {
    hash_value(&json!({
        "engine_version": ENGINE_VERSION,
        "definition_hash": definition.definition_hash,
        "step_id": step_id,
        "params": params,
        "input_hashes": input_hashes,
        "output_hashes": output_hashes,
    }))
}
