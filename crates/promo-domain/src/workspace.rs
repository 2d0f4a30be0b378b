//! Directorio compartido de una ejecución del pipeline.
//!
//! El step de fetch escribe el repositorio en `mlrepo/`; los steps
//! posteriores sólo leen. El orden lo garantiza la arista de dependencia del
//! DAG, no un lock.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PipelineError;

/// Subdirectorio donde queda el código descargado.
pub const REPO_DIR_NAME: &str = "mlrepo";

/// Repositorio y rama/tag a descargar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub url: String,
    pub branch: String,
}

#[derive(Debug)]
pub struct SharedWorkspace {
    root: PathBuf,
    torn_down: AtomicBool,
}

impl SharedWorkspace {
    /// Crea `<base>/promoflow-<uuid>`.
    pub fn create(base: &Path) -> Result<Self, PipelineError> {
        let root = base.join(format!("promoflow-{}", Uuid::new_v4()));
        fs::create_dir_all(&root).map_err(|e| PipelineError::Workspace(format!("{}: {e}", root.display())))?;
        debug!("workspace created at {}", root.display());
        Ok(Self { root,
                  torn_down: AtomicBool::new(false) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.root.join(REPO_DIR_NAME)
    }

    /// Resuelve una ruta relativa al repositorio descargado. Las absolutas se
    /// respetan.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let p = Path::new(relative);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.repo_dir().join(p)
        }
    }

    /// Elimina el directorio. Idempotente.
    pub fn teardown(&self) -> Result<(), PipelineError> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::Workspace(format!("{}: {e}", self.root.display()))),
        }
    }
}

impl Drop for SharedWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("workspace cleanup failed: {e}");
        }
    }
}
