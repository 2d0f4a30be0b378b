#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use promo_core::model::{Artifact, ArtifactKind, ExecutionContext};
use promo_core::step::{StepDefinition, StepKind, StepRunResult};
use promo_core::CoreEngineError;
use serde_json::{json, Value};

/// Step de prueba: emite `payload` (o falla) y anota su id en `trace`.
#[derive(Debug, Clone)]
pub struct JsonStep {
    pub id: String,
    pub kind: StepKind,
    pub payload: Value,
    pub fail: bool,
    pub trace: Arc<Mutex<Vec<String>>>,
}

impl JsonStep {
    pub fn new(id: &str, kind: StepKind, payload: Value, trace: &Arc<Mutex<Vec<String>>>) -> Self {
        Self { id: id.to_string(),
               kind,
               payload,
               fail: false,
               trace: Arc::clone(trace) }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn boxed(self) -> Box<dyn StepDefinition> {
        Box::new(self)
    }
}

#[async_trait]
impl StepDefinition for JsonStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn base_params(&self) -> Value {
        json!({})
    }

    async fn run(&self, _ctx: &ExecutionContext) -> StepRunResult {
        if let Ok(mut t) = self.trace.lock() {
            t.push(self.id.clone());
        }
        if self.fail {
            return StepRunResult::Failure { error: CoreEngineError::step("Boom", format!("{} failed", self.id)) };
        }
        StepRunResult::Success { outputs: vec![Artifact::new_unhashed(ArtifactKind::GenericJson,
                                                                      self.payload.clone(),
                                                                      None)] }
    }

    fn kind(&self) -> StepKind {
        self.kind
    }
}

pub fn trace() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn traced(t: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    t.lock().unwrap().clone()
}
