//! Implementaciones Postgres (Diesel).
//!
//! - `PgEventStore`: event log append-only con orden total por `seq`
//!   (BIGSERIAL). Lectura por `flow_id` ordenada por `seq`, con paridad 1:1
//!   respecto al backend en memoria.
//! - `PgModelRegistry`: modelos y versiones append-only. La sección
//!   leer/registrar toma un advisory lock transaccional por nombre de modelo,
//!   de modo que dos procesos no registren la misma versión.
//! - `PgFlowRepository`: delega el replay a `InMemoryFlowRepository`.
//!
//! Errores transitorios se reintentan con un backoff corto (`with_retry`).

mod event_store;
mod model_registry;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{info, warn};
use promo_core::repo::FlowInstance;
use promo_core::{FlowDefinition, FlowEvent, FlowRepository, InMemoryFlowRepository};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub use event_store::PgEventStore;
pub use model_registry::PgModelRegistry;

/// Pool r2d2 de conexiones Postgres. Al construirlo se corren las
/// migraciones pendientes.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Errores que vale la pena reintentar: conflictos de serialización, IO del
/// pool y algunos mensajes de desconexión que llegan como `Unknown`.
pub(crate) fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Hasta 3 reintentos con backoff 15ms, 30ms, 45ms.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Replay idéntico al backend en memoria.
#[derive(Debug, Default)]
pub struct PgFlowRepository;

impl PgFlowRepository {
    pub fn new() -> Self {
        Self
    }
}

impl FlowRepository for PgFlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance {
        InMemoryFlowRepository::new().load(flow_id, events, definition)
    }
}

/// Construye el pool y corre las migraciones pendientes.
///
/// Tamaños 0 se elevan a 1; si `min_size > max_size` se usa `min = max`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max = max_size.max(1);
    let min = min_size.max(1);
    if min > max {
        warn!("min_size > max_size ({min} > {max}), using min = max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(min.min(max)))
                                    .max_size(max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    info!("postgres pool ready (min_idle={}, max_size={max})", min.min(max));
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_gives_up_after_three_attempts() {
        let calls = Cell::new(0);
        let r: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::SerializationConflict)
        });
        assert!(r.is_err());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let r: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::CheckViolation("event_type".into()))
        });
        assert!(r.is_err());
        assert_eq!(calls.get(), 1);
        assert!(is_retryable(&PersistenceError::Unknown("Deadlock detected".into())));
    }
}
