//! promoflow: entrena, decide y despliega condicionalmente un modelo.
//!
//! La librería expone la configuración (`config`), los errores de la
//! aplicación (`errors`) y los subcomandos de la CLI (`app`). El motor, el
//! dominio y los adaptadores viven en los crates `promo-*` del workspace.

pub mod app;
pub mod config;
pub mod errors;

pub use config::PipelineConfig;
pub use errors::AppError;
