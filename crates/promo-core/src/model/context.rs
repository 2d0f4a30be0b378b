use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::Artifact;

/// Contexto de ejecución entregado a `StepDefinition::run`.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub flow_id: Uuid,
    pub step_id: String,
    /// Output principal de la primera dependencia declarada (None en sources).
    pub input: Option<Artifact>,
    /// Outputs principales de todas las dependencias, por id de step.
    pub inputs: BTreeMap<String, Artifact>,
    /// Parámetros efectivos (base + inyectores).
    pub params: Value,
}

impl ExecutionContext {
    /// Contexto vacío, útil para steps fuente y para tests de inyectores.
    pub fn detached(step_id: &str, params: Value) -> Self {
        Self { flow_id: Uuid::nil(),
               step_id: step_id.to_string(),
               input: None,
               inputs: BTreeMap::new(),
               params }
    }

    /// Deserializa los params efectivos a un tipo concreto.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}
