//! Tipos de repositorio: estado reconstruido (`FlowInstance`).
//!
//! El repositorio aplica un replay puro: consume eventos en orden y deriva
//! el estado de cada step y la rama elegida por cada gate. No almacena
//! artifacts completos (sólo hashes).
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::FlowDefinition;
use crate::event::{FlowEvent, FlowEventKind};
use crate::step::StepStatus;

#[derive(Debug, Clone)]
pub struct FlowInstance {
    pub id: Uuid,
    pub steps: Vec<StepSlot>,
    /// Valor leído de cada `(gate, key)`.
    pub branches: BTreeMap<(String, String), bool>,
    pub completed: bool,
    pub failed: bool,
}

/// Estado de un step en la instancia.
#[derive(Debug, Clone)]
pub struct StepSlot {
    pub step_id: String,
    pub status: StepStatus,
    pub fingerprint: Option<String>,
    pub outputs: Vec<String>, // sólo hashes
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl FlowInstance {
    pub fn slot(&self, step_id: &str) -> Option<&StepSlot> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn status_of(&self, step_id: &str) -> Option<&StepStatus> {
        self.slot(step_id).map(|s| &s.status)
    }

    pub fn branch(&self, gate: &str, key: &str) -> Option<bool> {
        self.branches.get(&(gate.to_string(), key.to_string())).copied()
    }

    pub fn failed_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed))
            .map(|s| s.step_id.clone())
            .collect()
    }
}

/// Trait para reconstruir (`replay`) el estado de un flow a partir de eventos.
pub trait FlowRepository: Send {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance;
}

#[derive(Debug, Default)]
pub struct InMemoryFlowRepository;

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self
    }
}

impl FlowRepository for InMemoryFlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance {
        let mut steps: Vec<StepSlot> = definition.nodes()
                                                 .iter()
                                                 .map(|n| StepSlot { step_id: n.id().to_string(),
                                                                     status: StepStatus::Pending,
                                                                     fingerprint: None,
                                                                     outputs: vec![],
                                                                     started_at: None,
                                                                     finished_at: None,
                                                                     attempts: 0 })
                                                 .collect();
        let mut branches = BTreeMap::new();
        let mut completed = false;
        let mut failed = false;
        for ev in events {
            match &ev.kind {
                FlowEventKind::FlowInitialized { .. } | FlowEventKind::StepSignal { .. } => {}
                FlowEventKind::StepStarted { step_index, .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Running;
                        slot.started_at = Some(ev.ts);
                        slot.attempts += 1;
                    }
                }
                FlowEventKind::StepFinished { step_index,
                                              fingerprint,
                                              outputs,
                                              .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Succeeded;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.outputs = outputs.clone();
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StepFailed { step_index, fingerprint, .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Failed;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StepSkipped { step_index, reason, .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Skipped(reason.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::BranchSelected { gate_id, key, value } => {
                    branches.insert((gate_id.clone(), key.clone()), *value);
                }
                FlowEventKind::FlowCompleted { .. } => completed = true,
                FlowEventKind::FlowFailed { .. } => failed = true,
            }
        }

        // Pending -> Ready cuando todas las dependencias terminaron bien y,
        // para steps condicionales, la rama elegida coincide.
        for idx in 0..steps.len() {
            if !matches!(steps[idx].status, StepStatus::Pending) {
                continue;
            }
            let deps_ok = definition.dependencies(idx)
                                    .iter()
                                    .all(|d| matches!(steps[*d].status, StepStatus::Succeeded));
            let branch_ok = match definition.group_of(idx) {
                Some(g) => branches.get(&(g.gate.clone(), g.key.clone())) == Some(&g.equals),
                None => true,
            };
            if deps_ok && branch_ok {
                steps[idx].status = StepStatus::Ready;
            }
        }

        FlowInstance { id: flow_id,
                       steps,
                       branches,
                       completed,
                       failed }
    }
}
