use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::run_result::StepRunResult;
use crate::model::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Source,
    Transform,
    /// Produce la decisión booleana que selecciona un grupo condicional.
    Gate,
    Sink,
}

/// Trait que define un Step ejecutable por el engine.
#[async_trait]
pub trait StepDefinition: Send + Sync + std::fmt::Debug {
    /// Identificador estable y único dentro del Flow.
    fn id(&self) -> &str;

    /// Nombre opcional amigable.
    fn name(&self) -> &str {
        self.id()
    }

    /// Parámetros base deterministas (defaults). Los inyectores se fusionan
    /// encima.
    fn base_params(&self) -> Value;

    /// Ejecución del step. Puede bloquear en IO externo (await).
    async fn run(&self, ctx: &ExecutionContext) -> StepRunResult;

    /// Tipo general del step.
    fn kind(&self) -> StepKind;
}
