//! Constantes del motor core.
//!
//! `ENGINE_VERSION` participa en el cálculo de fingerprints: cambiarla
//! invalida deterministamente los fingerprints previos aunque la definición y
//! los datos no cambien.

/// Versión lógica del motor DAG.
pub const ENGINE_VERSION: &str = "D1.0";

/// Concurrencia por defecto de una ola de steps listos.
pub const DEFAULT_MAX_PARALLEL: usize = 4;
