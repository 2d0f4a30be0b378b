use serde::{Deserialize, Serialize};

/// Pedido de creación/actualización de un deployment de serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub name: String,
    pub namespace: String,
    pub model_name: String,
    pub model_version: u32,
    pub checkpoint_uuid: String,
    pub serving_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub namespace: String,
    pub model_name: String,
    pub model_version: u32,
    pub serving_image: String,
    pub endpoint: String,
    /// `true` si se creó, `false` si se actualizó uno existente.
    pub created: bool,
}
