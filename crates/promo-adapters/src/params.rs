//! Parámetros del pipeline `train_and_deploy`.
use serde::{Deserialize, Serialize};

/// Todo lo que un caller configura del pipeline. Los nombres de campo son
/// los mismos que usan los params de cada step, de modo que
/// `PipelineParamsInjector` puede sobreescribirlos por nombre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub repo_url: String,
    pub branch: String,
    /// Relativo al repositorio descargado.
    pub config: String,
    /// Relativo al repositorio descargado.
    pub context: String,
    pub tracker_endpoint: String,
    pub model_name: String,
    pub deployment_name: String,
    pub deployment_namespace: String,
    pub serving_image: String,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self { repo_url: "https://github.com/determined-ai/determined.git".into(),
               branch: "0.13.0".into(),
               config: "examples/official/trial/mnist_pytorch/const.yaml".into(),
               context: "examples/official/trial/mnist_pytorch/".into(),
               tracker_endpoint: "http://localhost:8080".into(),
               model_name: "mnist-prod".into(),
               deployment_name: "mnist-prod-kf".into(),
               deployment_namespace: "david".into(),
               serving_image: "davidhershey/seldon-mnist:1.6".into() }
    }
}
