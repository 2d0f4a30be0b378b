//! `FlowDefinition`: DAG inmutable de steps con grupos condicionales.
//!
//! La definición se valida completa en `FlowDefinitionBuilder::build`:
//! ids únicos, dependencias conocidas, ausencia de ciclos y gates válidos.
//! Un grupo condicional se declara por adelantado y queda asociado a un
//! único gate; sus steps dependen implícitamente del gate, por lo que el
//! grafo sigue siendo analizable estáticamente.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::json;

use crate::errors::CoreEngineError;
use crate::hashing::hash_value;
use crate::step::{StepDefinition, StepKind};

/// Grupo condicional: sus steps sólo se materializan si el output del `gate`
/// tiene `key == equals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionGroup {
    pub name: String,
    pub gate: String,
    pub key: String,
    pub equals: bool,
}

impl ConditionGroup {
    pub fn new(name: impl Into<String>, gate: impl Into<String>, key: impl Into<String>, equals: bool) -> Self {
        Self { name: name.into(),
               gate: gate.into(),
               key: key.into(),
               equals }
    }
}

/// Nodo del DAG.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub step: Arc<dyn StepDefinition>,
    /// Dependencias declaradas (`after`), en orden de declaración.
    pub after: Vec<String>,
    /// Índice del grupo condicional al que pertenece, si alguno.
    pub group: Option<usize>,
}

impl StepNode {
    pub fn id(&self) -> &str {
        self.step.id()
    }
}

/// Definición inmutable y validada del Flow.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    nodes: Vec<StepNode>,
    groups: Vec<ConditionGroup>,
    /// Dependencias efectivas por índice (after + gate del grupo).
    deps: Vec<Vec<usize>>,
    /// Orden topológico estable (desempate por orden de declaración).
    order: Vec<usize>,
    pub definition_hash: String,
}

impl FlowDefinition {
    pub fn builder() -> FlowDefinitionBuilder {
        FlowDefinitionBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&StepNode> {
        self.nodes.get(index)
    }

    pub fn groups(&self) -> &[ConditionGroup] {
        &self.groups
    }

    pub fn index_of(&self, step_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == step_id)
    }

    /// Dependencias efectivas de un step (incluye el gate de su grupo).
    pub fn dependencies(&self, index: usize) -> &[usize] {
        self.deps.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    pub fn group_of(&self, index: usize) -> Option<&ConditionGroup> {
        self.nodes.get(index).and_then(|n| n.group).and_then(|g| self.groups.get(g))
    }

    /// Grupos cuyo gate es el step indicado.
    pub fn groups_gated_by(&self, step_id: &str) -> impl Iterator<Item = &ConditionGroup> {
        let owned = step_id.to_string();
        self.groups.iter().filter(move |g| g.gate == owned)
    }
}

#[derive(Debug, Default)]
pub struct FlowDefinitionBuilder {
    nodes: Vec<StepNode>,
    groups: Vec<ConditionGroup>,
}

impl FlowDefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step sin dependencias.
    pub fn step(self, step: Box<dyn StepDefinition>) -> Self {
        self.step_after(step, &[])
    }

    /// Step que corre después de todos los ids indicados.
    pub fn step_after(mut self, step: Box<dyn StepDefinition>, after: &[&str]) -> Self {
        self.nodes.push(StepNode { step: Arc::from(step),
                                   after: after.iter().map(|s| s.to_string()).collect(),
                                   group: None });
        self
    }

    /// Declara un grupo condicional con sus steps. Cada step depende del gate
    /// del grupo; `after` añade dependencias extra opcionales.
    pub fn condition_group(mut self, group: ConditionGroup, steps: Vec<(Box<dyn StepDefinition>, Vec<String>)>) -> Self {
        let gi = self.groups.len();
        self.groups.push(group);
        for (step, after) in steps {
            self.nodes.push(StepNode { step: Arc::from(step),
                                       after,
                                       group: Some(gi) });
        }
        self
    }

    pub fn build(self) -> Result<FlowDefinition, CoreEngineError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, n) in self.nodes.iter().enumerate() {
            if index.insert(n.id().to_string(), i).is_some() {
                return Err(CoreEngineError::DuplicateStep(n.id().to_string()));
            }
        }

        for g in &self.groups {
            let gate_ok = index.get(&g.gate)
                               .map(|i| matches!(self.nodes[*i].step.kind(), StepKind::Gate))
                               .unwrap_or(false);
            let gate_inside = index.get(&g.gate)
                                   .and_then(|i| self.nodes[*i].group)
                                   .map(|gi| self.groups[gi] == *g)
                                   .unwrap_or(false);
            if !gate_ok || gate_inside {
                return Err(CoreEngineError::InvalidGate { group: g.name.clone(),
                                                          gate: g.gate.clone() });
            }
        }

        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(self.nodes.len());
        for n in &self.nodes {
            let mut d: Vec<usize> = Vec::new();
            for a in &n.after {
                let Some(i) = index.get(a) else {
                    return Err(CoreEngineError::UnknownDependency { step: n.id().to_string(),
                                                                    dependency: a.clone() });
                };
                if !d.contains(i) {
                    d.push(*i);
                }
            }
            if let Some(gi) = n.group {
                let gate = index[&self.groups[gi].gate];
                if !d.contains(&gate) {
                    d.push(gate);
                }
            }
            deps.push(d);
        }

        let order = topological_sort(&deps).map_err(|rest| {
                                               CoreEngineError::CycleDetected(rest.iter()
                                                                                  .map(|i| self.nodes[*i].id().to_string())
                                                                                  .collect())
                                           })?;

        let definition_hash = definition_hash(&self.nodes, &self.groups, &deps);
        Ok(FlowDefinition { nodes: self.nodes,
                            groups: self.groups,
                            deps,
                            order,
                            definition_hash })
    }
}

/// Kahn con cola ordenada por índice. En caso de ciclo devuelve los nodos que
/// no pudieron ordenarse.
fn topological_sort(deps: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let n = deps.len();
    let mut indegree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, d) in deps.iter().enumerate() {
        for j in d {
            dependents[*j].push(i);
        }
    }
    let mut ready: BTreeSet<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for k in &dependents[i] {
            indegree[*k] -= 1;
            if indegree[*k] == 0 {
                ready.insert(*k);
            }
        }
    }
    if order.len() == n {
        Ok(order)
    } else {
        Err((0..n).filter(|i| !order.contains(i)).collect())
    }
}

fn definition_hash(nodes: &[StepNode], groups: &[ConditionGroup], deps: &[Vec<usize>]) -> String {
    let steps: Vec<_> = nodes.iter()
                             .enumerate()
                             .map(|(i, n)| {
                                 let mut after: Vec<&str> = deps[i].iter().map(|d| nodes[*d].id()).collect();
                                 after.sort_unstable();
                                 json!({
                                     "id": n.id(),
                                     "kind": n.step.kind(),
                                     "after": after,
                                     "group": n.group.map(|g| json!({
                                         "name": groups[g].name,
                                         "gate": groups[g].gate,
                                         "key": groups[g].key,
                                         "equals": groups[g].equals,
                                     })),
                                 })
                             })
                             .collect();
    hash_value(&json!({ "steps": steps }))
}
