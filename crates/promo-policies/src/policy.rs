use promo_core::hashing::{hash_str, to_canonical_json};
use serde::{Deserialize, Serialize};

/// Parámetros de las políticas soportadas.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", content = "params")]
pub enum PolicyParams {
    /// Compara sólo contra la última versión registrada; empate no promueve.
    StrictImprovement,
}

/// Contrato de comparación candidato vs. versión vigente.
pub trait PromotionPolicy: Send + Sync {
    fn id(&self) -> &'static str;

    fn params(&self) -> PolicyParams;

    /// `true` si `candidate` supera a `current` en la dirección indicada.
    fn is_better(&self, candidate: f64, current: f64, smaller_is_better: bool) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StrictImprovementPolicy;

impl PromotionPolicy for StrictImprovementPolicy {
    fn id(&self) -> &'static str {
        "strict_improvement"
    }

    fn params(&self) -> PolicyParams {
        PolicyParams::StrictImprovement
    }

    fn is_better(&self, candidate: f64, current: f64, smaller_is_better: bool) -> bool {
        // Con NaN ambas comparaciones son falsas: nunca promueve.
        if smaller_is_better {
            candidate < current
        } else {
            candidate > current
        }
    }
}

/// Hash canónico de parámetros (auditoría).
pub fn params_hash(params: &PolicyParams) -> String {
    let v = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);
    hash_str(&to_canonical_json(&v))
}
