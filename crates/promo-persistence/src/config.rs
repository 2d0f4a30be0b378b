//! Configuración de conexión desde variables de entorno (`DATABASE_URL` y
//! tamaños de pool opcionales).

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// .env se carga una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL not set".into()))?;
        let min_connections = env::var("DATABASE_MIN_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(2);
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(16);
        Ok(Self { url,
                  min_connections,
                  max_connections })
    }

    /// `true` si hay `DATABASE_URL` (tras cargar `.env`).
    pub fn is_configured() -> bool {
        Lazy::force(&DOTENV_LOADED);
        env::var("DATABASE_URL").is_ok()
    }
}

/// Fuerza la carga temprana de `.env`.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
