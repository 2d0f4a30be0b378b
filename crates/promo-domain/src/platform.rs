//! Contratos con los sistemas externos.
//!
//! El pipeline sólo conoce estos traits; las implementaciones concretas
//! (git, archivos, memoria, Postgres) viven en `promo-adapters` y
//! `promo-persistence`.
use std::path::PathBuf;

use async_trait::async_trait;

use crate::{Checkpoint, Deployment, DeploymentRequest, JobId, JobSpec, JobState, Model, ModelLookup, ModelVersion,
            PipelineError, RepoRef, SharedWorkspace};

/// Descarga el código de entrenamiento dentro del workspace.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Devuelve el directorio del repositorio (`<workspace>/mlrepo`).
    async fn fetch(&self, repo: &RepoRef, workspace: &SharedWorkspace) -> Result<PathBuf, PipelineError>;
}

/// Plataforma de entrenamiento (experiment tracker).
#[async_trait]
pub trait JobPlatform: Send + Sync {
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, PipelineError>;
    async fn state(&self, job: &JobId) -> Result<JobState, PipelineError>;
    async fn top_checkpoint(&self, job: &JobId) -> Result<Checkpoint, PipelineError>;
}

/// Registro de modelos versionados.
///
/// Las operaciones son síncronas: los callers async las ejecutan en
/// `spawn_blocking`. Cualquier fallo de acceso se reporta como
/// `ModelRegistryUnavailable`.
pub trait ModelRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Result<ModelLookup, PipelineError>;
    fn create_model(&self, name: &str) -> Result<Model, PipelineError>;
    /// Agrega una versión al final de la secuencia (número = última + 1).
    fn register_version(&self, name: &str, checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError>;
    /// Todas las versiones en orden de registro.
    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>, PipelineError>;

    /// Ejecuta `section` con el modelo `name` bloqueado también frente a
    /// otros procesos que comparten el registro. Las llamadas al registro
    /// hechas dentro de `section` desde el mismo hilo no se bloquean.
    ///
    /// La implementación por defecto no agrega exclusión: sirve para
    /// registros que sólo viven en el proceso o que serializan por su cuenta.
    fn exclusive(&self,
                 name: &str,
                 section: &mut dyn FnMut() -> Result<(), PipelineError>)
                 -> Result<(), PipelineError> {
        let _ = name;
        section()
    }
}

/// Plataforma de serving.
#[async_trait]
pub trait ServingPlatform: Send + Sync {
    /// Crea o actualiza el deployment con nombre `request.name`.
    async fn apply_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, PipelineError>;
}
