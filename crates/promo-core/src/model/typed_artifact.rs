//! Tipado fuerte opcional para `Artifact`, manteniendo el núcleo agnóstico.
//! Un tipo concreto se expone como artifact implementando `ArtifactSpec`
//! (normalmente vía `typed_artifact!`).

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{Artifact, ArtifactKind};

/// Errores al codificar/decodificar un artifact tipado.
#[derive(Debug, Error)]
pub enum ArtifactDecodeError {
    #[error("artifact kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch { expected: ArtifactKind, found: ArtifactKind },
    #[error("schema version mismatch: expected {expected}, found {found:?}")]
    VersionMismatch { expected: u32, found: Option<u32> },
    #[error("serialize: {0}")]
    Serialize(String),
    #[error("deserialize: {0}")]
    Deserialize(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Especificación abstracta de un artifact tipado.
pub trait ArtifactSpec: Sized + Serialize + DeserializeOwned + Clone {
    /// Kind asociado (permite distinguir en runtime).
    const KIND: ArtifactKind;
    /// Versión de esquema (incrementar en cambios incompatibles).
    const SCHEMA_VERSION: u32 = 1;

    /// Validación semántica ligera (sin efectos secundarios).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Nombre del campo que lleva la versión dentro del payload.
    fn version_field_name() -> &'static str {
        "schema_version"
    }

    /// Serializa a `Artifact` sin hash (lo añade el engine).
    fn into_artifact(self) -> Result<Artifact, ArtifactDecodeError> {
        let mut value = serde_json::to_value(&self).map_err(|e| ArtifactDecodeError::Serialize(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.entry(Self::version_field_name().to_string())
               .or_insert(Value::from(Self::SCHEMA_VERSION));
        }
        Ok(Artifact::new_unhashed(Self::KIND, value, None))
    }

    /// Decodifica desde artifact neutro verificando kind, versión y validación.
    fn from_artifact(a: &Artifact) -> Result<Self, ArtifactDecodeError> {
        if a.kind != Self::KIND {
            return Err(ArtifactDecodeError::KindMismatch { expected: Self::KIND,
                                                           found: a.kind.clone() });
        }
        let found_version = a.payload
                             .get(Self::version_field_name())
                             .and_then(|v| v.as_u64())
                             .map(|v| v as u32);
        if found_version != Some(Self::SCHEMA_VERSION) {
            return Err(ArtifactDecodeError::VersionMismatch { expected: Self::SCHEMA_VERSION,
                                                              found: found_version });
        }
        let decoded: Self =
            serde_json::from_value(a.payload.clone()).map_err(|e| ArtifactDecodeError::Deserialize(e.to_string()))?;
        decoded.validate().map_err(ArtifactDecodeError::Validation)?;
        Ok(decoded)
    }
}
