//! promo-persistence
//!
//! Implementaciones Postgres (Diesel) del `EventStore` del core y del
//! `ModelRegistry` del dominio, más utilidades de conexión y migraciones.
//!
//! Módulos:
//! - `pg`: event log append-only, registro de modelos y pool r2d2.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgEventStore, PgFlowRepository, PgModelRegistry,
             PgPool, PoolProvider};
