//! Steps del pipeline `train_and_deploy`.
//!
//! Todos son `TypedStep`: el engine decodifica params (base + inyectores) y
//! el artifact de la dependencia principal antes de llamar a `run_typed`.

pub mod clone;
pub mod decide;
pub mod deploy;
pub mod extract;
pub mod notify;
pub mod train;

pub use clone::{CloneParams, CloneRepoStep};
pub use decide::{DecideParams, DecideStep};
pub use deploy::{DeployParams, DeployStep};
pub use extract::ExtractMetricStep;
pub use notify::{NoDeployStep, NotifyParams};
pub use train::{TrainParams, TrainStep};

pub const CLONE_STEP: &str = "clone";
pub const TRAIN_STEP: &str = "train";
pub const EXTRACT_STEP: &str = "extract-metric";
pub const DECIDE_STEP: &str = "decide";
pub const DEPLOY_STEP: &str = "deploy";
pub const NO_DEPLOY_STEP: &str = "no-deploy";
