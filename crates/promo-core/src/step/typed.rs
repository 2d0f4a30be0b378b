use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::{StepKind, StepRunResult, StepSignal};
use crate::errors::CoreEngineError;
use crate::model::{ArtifactSpec, ExecutionContext};

/// Resultado tipado de ejecutar un `TypedStep`.
pub enum StepRunResultTyped<Out: ArtifactSpec> {
    Success { outputs: Vec<Out> },
    SuccessWithSignals { outputs: Vec<Out>, signals: Vec<StepSignal> },
    Failure { error: CoreEngineError },
}

impl<Out: ArtifactSpec> StepRunResultTyped<Out> {
    /// Atajo para el caso habitual de un único output.
    pub fn single(out: Out) -> Self {
        Self::Success { outputs: vec![out] }
    }

    /// Convierte a `StepRunResult` neutro serializando los outputs.
    pub fn into_neutral(self) -> StepRunResult {
        let encode = |outs: Vec<Out>| -> Result<Vec<_>, CoreEngineError> {
            outs.into_iter()
                .map(|o| o.into_artifact().map_err(|e| CoreEngineError::Internal(e.to_string())))
                .collect()
        };
        match self {
            Self::Success { outputs } => match encode(outputs) {
                Ok(outputs) => StepRunResult::Success { outputs },
                Err(error) => StepRunResult::Failure { error },
            },
            Self::SuccessWithSignals { outputs, signals } => match encode(outputs) {
                Ok(outputs) => StepRunResult::SuccessWithSignals { outputs, signals },
                Err(error) => StepRunResult::Failure { error },
            },
            Self::Failure { error } => StepRunResult::Failure { error },
        }
    }
}

/// Interfaz de alto nivel para definir Steps con tipos fuertes
/// (Params / Input / Output).
///
/// El adaptador de abajo convierte cualquier `TypedStep` en un
/// `StepDefinition` neutro: decodifica params (base + inyectores) y el input
/// principal, ejecuta `run_typed` y re-codifica los outputs.
#[async_trait]
pub trait TypedStep: Send + Sync {
    type Params: DeserializeOwned + Serialize + Clone + Default + Send;
    /// Input principal (output de la primera dependencia). En sources se
    /// ignora y llega `None`.
    type Input: ArtifactSpec + Send;
    type Output: ArtifactSpec + Send;

    fn id(&self) -> &str;

    fn kind(&self) -> StepKind;

    /// Parámetros por defecto deterministas.
    fn params_default(&self) -> Self::Params {
        Default::default()
    }

    async fn run_typed(&self, input: Option<Self::Input>, params: Self::Params) -> StepRunResultTyped<Self::Output>;
}

#[async_trait]
impl<T> crate::step::StepDefinition for T where T: TypedStep + std::fmt::Debug + 'static
{
    fn id(&self) -> &str {
        TypedStep::id(self)
    }

    fn base_params(&self) -> serde_json::Value {
        serde_json::to_value(self.params_default()).unwrap_or(serde_json::Value::Null)
    }

    async fn run(&self, ctx: &ExecutionContext) -> StepRunResult {
        let params: T::Params = match ctx.params_as() {
            Ok(p) => p,
            Err(e) => {
                return StepRunResult::Failure { error: CoreEngineError::step("InvalidParams", e.to_string()) };
            }
        };
        let typed_in = match ctx.input.as_ref() {
            Some(a) if !matches!(TypedStep::kind(self), StepKind::Source) => match T::Input::from_artifact(a) {
                Ok(v) => Some(v),
                Err(e) => {
                    return StepRunResult::Failure { error: CoreEngineError::step("InvalidInput", e.to_string()) };
                }
            },
            _ => None,
        };
        self.run_typed(typed_in, params).await.into_neutral()
    }

    fn kind(&self) -> StepKind {
        TypedStep::kind(self)
    }
}
