//! Errores de la aplicación y su código de salida.
use promo_core::CoreEngineError;
use promo_domain::PipelineError;
use promo_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("configuration: {0}")]
    Config(String),
    #[error("engine: {0}")]
    Engine(#[from] CoreEngineError),
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_FLOW_FAILED: i32 = 4;
pub const EXIT_INFRA: i32 = 5;

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Config(_) => EXIT_USAGE,
            Self::Engine(CoreEngineError::FlowFailed { .. }) => EXIT_FLOW_FAILED,
            _ => EXIT_INFRA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(AppError::Usage("x".into()).exit_code(), EXIT_USAGE);
        assert_eq!(AppError::from(CoreEngineError::FlowFailed { failed_steps: vec![] }).exit_code(),
                   EXIT_FLOW_FAILED);
        assert_eq!(AppError::from(PipelineError::ModelRegistryUnavailable("down".into())).exit_code(),
                   EXIT_INFRA);
    }

    #[test]
    fn display_keeps_source_message() {
        let e = AppError::from(CoreEngineError::Storage("pool error".into()));
        assert_eq!(e.to_string(), "engine: storage: pool error");
    }
}
