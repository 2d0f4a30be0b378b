//! Contrato para inyectores de parámetros.
//!
//! Un `ParamInjector` recibe los `base` params del step y el `ExecutionContext`
//! y devuelve un `Value` que será mergeado sobre los params actuales. Los
//! inyectores deben ser deterministas y no provocar efectos secundarios.

use serde_json::Value;

use super::merge_json;
use crate::model::ExecutionContext;

pub trait ParamInjector: Send + Sync + std::fmt::Debug {
    /// Devuelve una estructura JSON que será mergeada sobre `base`.
    fn inject(&self, base: &Value, ctx: &ExecutionContext) -> Value;
}

/// Aplica una serie de inyectores en orden.
#[derive(Debug, Default)]
pub struct CompositeInjector {
    pub injectors: Vec<Box<dyn ParamInjector>>,
}

impl CompositeInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_injectors(injectors: Vec<Box<dyn ParamInjector>>) -> Self {
        Self { injectors }
    }

    pub fn apply(&self, base: &Value, ctx: &ExecutionContext) -> Value {
        Self::apply_injectors(&self.injectors, base, ctx)
    }

    /// Variante por referencia para quien guarda los inyectores en otra
    /// estructura (el engine).
    pub fn apply_injectors(injectors: &[Box<dyn ParamInjector>], base: &Value, ctx: &ExecutionContext) -> Value {
        injectors.iter().fold(base.clone(), |acc, inj| merge_json(&acc, &inj.inject(base, ctx)))
    }
}
