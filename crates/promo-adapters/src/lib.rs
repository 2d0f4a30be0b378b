//! promo-adapters: capa de adaptación Dominio ↔ Core.
//!
//! Este crate provee:
//! - Artifacts tipados que fluyen entre los steps del pipeline.
//! - Adaptadores de los sistemas externos (git, CLI del experiment tracker,
//!   serving, registro de modelos en archivo JSON) y fakes en memoria.
//! - Los steps `clone → train → extract-metric → decide → (deploy | no-deploy)`
//!   y el `PipelineRunner` que arma y ejecuta el DAG.

pub mod artifacts;
pub mod encoder;
pub mod fetchers;
pub mod injectors;
pub mod jobs;
pub mod memory;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod serving;
pub mod steps;
pub mod tracker;

pub use jobs::{JobRunner, PollPolicy};
pub use params::PipelineParams;
pub use pipeline::{train_and_deploy, Collaborators, PipelineRunner, RunOutcome, RunReport, NOT_DEPLOYED_MESSAGE};
pub use serving::DeploymentTrigger;
