//! Artifact neutral del flujo.
//!
//! Un `Artifact` es la unidad de datos intercambiada entre steps:
//! - `payload` es JSON genérico; el motor no interpreta su semántica salvo
//!   la clave booleana que lee de un gate.
//! - `hash` lo calcula el engine sobre el JSON canonicalizado.
//! - `metadata` anota información auxiliar que no entra al hash.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tipos neutrales de artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    GenericJson,
}

/// Artifact neutral producido/consumido por Steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub hash: String,            // asignado por el engine
    pub payload: Value,
    pub metadata: Option<Value>, // no entra al hash
}

impl Artifact {
    /// Constructor de artifacts sin hash; el engine lo completa al almacenar.
    pub fn new_unhashed(kind: ArtifactKind, payload: Value, metadata: Option<Value>) -> Self {
        Self { kind,
               hash: String::new(),
               payload,
               metadata }
    }

    /// Lee un campo booleano de primer nivel del payload.
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }
}
