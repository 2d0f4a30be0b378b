use promo_core::model::ExecutionContext;
use promo_core::ParamInjector;
use serde_json::{Map, Value};

use crate::PipelineParams;

/// Sobreescribe los params base de cada step con los valores de
/// `PipelineParams` que comparten nombre. Claves que el step no declara no se
/// inyectan, así el fingerprint de cada step sólo depende de lo que usa.
#[derive(Debug, Clone)]
pub struct PipelineParamsInjector {
    values: Map<String, Value>,
}

impl PipelineParamsInjector {
    pub fn new(params: &PipelineParams) -> Self {
        let values = match serde_json::to_value(params) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        };
        Self { values }
    }
}

impl ParamInjector for PipelineParamsInjector {
    fn inject(&self, base: &Value, _ctx: &ExecutionContext) -> Value {
        // Steps sin params (`()`) tienen base `null`: no hay nada que inyectar.
        let Some(keys) = base.as_object() else {
            return Value::Null;
        };
        let out: Map<String, Value> = keys.keys()
                                          .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
                                          .collect();
        Value::Object(out)
    }
}
