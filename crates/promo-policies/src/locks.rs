use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use once_cell::sync::Lazy;

static GLOBAL_LOCKS: Lazy<ModelLocks> = Lazy::new(ModelLocks::default);

/// Tabla de locks por nombre de modelo.
///
/// Serializa la sección crítica leer/comparar/registrar de ejecuciones
/// concurrentes que apuntan al mismo modelo dentro del proceso.
#[derive(Debug, Clone, Default)]
pub struct ModelLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ModelLocks {
    /// Tabla compartida por todo el proceso.
    pub fn global() -> Self {
        GLOBAL_LOCKS.clone()
    }

    pub fn lock_for(&self, model_name: &str) -> Arc<Mutex<()>> {
        self.inner.entry(model_name.to_string()).or_default().clone()
    }

    /// Ejecuta `f` con el lock del modelo tomado.
    pub fn with_lock<T>(&self, model_name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(model_name);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}
