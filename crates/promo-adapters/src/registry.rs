//! Registro de modelos persistido en un archivo JSON.
//!
//! Cada operación lee el archivo completo, aplica el cambio y lo reescribe
//! (temporal único + rename). Todo acceso toma un lock exclusivo del sistema
//! operativo sobre `<archivo>.lock`, así que varios procesos `promoflow`
//! pueden compartir el mismo registro. `exclusive` mantiene ese lock durante
//! toda la decisión de promoción.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs4::fs_std::FileExt;
use log::{debug, warn};
use promo_domain::{Checkpoint, Model, ModelLookup, ModelRegistry, ModelVersion, PipelineError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

thread_local! {
    /// Registros cuyo lock ya tiene tomado este hilo.
    static HELD: RefCell<HashSet<PathBuf>> = RefCell::new(HashSet::new());
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    models: BTreeMap<String, ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ModelEntry {
    pub(crate) model: Model,
    pub(crate) versions: Vec<ModelVersion>,
}

impl ModelEntry {
    pub(crate) fn lookup(&self) -> ModelLookup {
        match self.versions.last() {
            Some(v) => ModelLookup::Current(self.model.clone(), v.clone()),
            None => ModelLookup::NoVersions(self.model.clone()),
        }
    }

    pub(crate) fn append(&mut self, checkpoint: &Checkpoint) -> ModelVersion {
        let v = ModelVersion { model_name: self.model.name.clone(),
                               version: self.versions.len() as u32 + 1,
                               checkpoint: checkpoint.clone(),
                               registered_at: Utc::now() };
        self.versions.push(v.clone());
        v
    }
}

#[derive(Debug)]
pub struct JsonFileModelRegistry {
    path: PathBuf,
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::ModelRegistryUnavailable(format!("{}: {e}", path.display()))
}

/// Lock tomado sobre el archivo auxiliar; se libera al soltarlo.
struct RegistryLock {
    file: File,
    registry: PathBuf,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        HELD.with(|h| h.borrow_mut().remove(&self.registry));
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("cannot unlock registry {}: {e}", self.registry.display());
        }
    }
}

impl JsonFileModelRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archivo auxiliar sobre el que se toma el lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(parent, e))?;
        }
        Ok(())
    }

    /// `None` si este hilo ya tiene el lock (llamada anidada).
    fn acquire(&self) -> Result<Option<RegistryLock>, PipelineError> {
        if HELD.with(|h| h.borrow().contains(&self.path)) {
            return Ok(None);
        }
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new().create(true)
                                     .read(true)
                                     .write(true)
                                     .truncate(false)
                                     .open(&lock_path)
                                     .map_err(|e| unavailable(&lock_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| unavailable(&lock_path, e))?;
        HELD.with(|h| h.borrow_mut().insert(self.path.clone()));
        debug!("registry lock taken on {}", lock_path.display());
        Ok(Some(RegistryLock { file,
                               registry: self.path.clone() }))
    }

    fn read(&self) -> Result<RegistryFile, PipelineError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| unavailable(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegistryFile::default()),
            Err(e) => Err(unavailable(&self.path, e)),
        }
    }

    fn write(&self, file: &RegistryFile) -> Result<(), PipelineError> {
        self.ensure_parent()?;
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);
        let body = serde_json::to_vec_pretty(file).map_err(|e| unavailable(&self.path, e))?;
        fs::write(&tmp, body).map_err(|e| unavailable(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
                                        let _ = fs::remove_file(&tmp);
                                        unavailable(&self.path, e)
                                    })
    }

    /// Lee bajo el lock, aplica `f` y, si `mutate`, reescribe.
    fn with_file<T>(&self,
                    mutate: bool,
                    f: impl FnOnce(&mut RegistryFile) -> Result<T, PipelineError>)
                    -> Result<T, PipelineError> {
        let _lock = self.acquire()?;
        let mut file = self.read()?;
        let out = f(&mut file)?;
        if mutate {
            self.write(&file)?;
        }
        Ok(out)
    }
}

impl ModelRegistry for JsonFileModelRegistry {
    fn lookup(&self, name: &str) -> Result<ModelLookup, PipelineError> {
        self.with_file(false, |f| Ok(f.models.get(name).map(ModelEntry::lookup).unwrap_or(ModelLookup::NotFound)))
    }

    fn create_model(&self, name: &str) -> Result<Model, PipelineError> {
        self.with_file(true, |f| {
                let entry = f.models.entry(name.to_string()).or_insert_with(|| ModelEntry { model: Model { name: name.to_string(),
                                                                                                       created_at: Utc::now() },
                                                                                             versions: Vec::new() });
                Ok(entry.model.clone())
            })
    }

    fn register_version(&self, name: &str, checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError> {
        self.with_file(true, |f| {
                f.models
                 .get_mut(name)
                 .map(|e| e.append(checkpoint))
                 .ok_or_else(|| PipelineError::ModelRegistryUnavailable(format!("model '{name}' does not exist")))
            })
    }

    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>, PipelineError> {
        self.with_file(false, |f| Ok(f.models.get(name).map(|e| e.versions.clone()).unwrap_or_default()))
    }

    fn exclusive(&self,
                 name: &str,
                 section: &mut dyn FnMut() -> Result<(), PipelineError>)
                 -> Result<(), PipelineError> {
        let _lock = self.acquire()?;
        debug!("exclusive section on '{name}' in {}", self.path.display());
        section()
    }
}
