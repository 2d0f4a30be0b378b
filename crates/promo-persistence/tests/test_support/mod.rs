#![allow(dead_code)]
use once_cell::sync::Lazy;
use promo_persistence::config::DbConfig;
use promo_persistence::pg::{build_pool, PgPool, PoolProvider};

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if !DbConfig::is_configured() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 4) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

/// `None` (y el test se omite) cuando no hay `DATABASE_URL`.
pub fn provider(test: &str) -> Option<PoolProvider> {
    match TEST_POOL.as_ref() {
        Some(pool) => Some(PoolProvider { pool: pool.clone() }),
        None => {
            eprintln!("skip {test} (no DATABASE_URL)");
            None
        }
    }
}
