use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::{FlowEvent, FlowEventKind};
use crate::errors::CoreEngineError;

/// Almacenamiento de eventos append-only.
pub trait EventStore: Send {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con
    /// seq y ts).
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> Result<FlowEvent, CoreEngineError>;
    /// Lista eventos de un flujo (orden ascendente por seq).
    fn list(&self, flow_id: Uuid) -> Result<Vec<FlowEvent>, CoreEngineError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    pub inner: HashMap<Uuid, Vec<FlowEvent>>,
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> Result<FlowEvent, CoreEngineError> {
        let vec = self.inner.entry(flow_id).or_default();
        let ev = FlowEvent { seq: vec.len() as u64,
                             flow_id,
                             kind,
                             ts: Utc::now() };
        vec.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, flow_id: Uuid) -> Result<Vec<FlowEvent>, CoreEngineError> {
        Ok(self.inner.get(&flow_id).cloned().unwrap_or_default())
    }
}
