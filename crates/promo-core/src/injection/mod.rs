//! Inyección de parámetros determinista.
//!
//! El orden de merge es fijo: `base_params` del step y luego cada inyector
//! en el orden en que se registró en el engine.

mod merge;
mod param_injector;

pub use merge::merge_json;
pub use param_injector::{CompositeInjector, ParamInjector};
