//! Definiciones relacionadas a Steps.
//!
//! Un Step es una unidad de trabajo del DAG: recibe los artifacts de sus
//! dependencias y produce 0..n artifacts. Este módulo define:
//! - `StepDefinition`: interfaz neutral usada por el engine.
//! - `TypedStep`: interfaz de alto nivel con tipos fuertes.
//! - `StepRunResult` y señales (`StepSignal`).

pub mod definition;
pub mod macros;
mod run_result;
mod status;
pub mod typed;

pub use definition::{StepDefinition, StepKind};
pub use run_result::{StepRunResult, StepSignal};
pub use status::{SkipReason, StepStatus};
pub use typed::{StepRunResultTyped, TypedStep};
