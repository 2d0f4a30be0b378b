//! Deployment Trigger y plataforma de serving basada en manifiestos.
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use promo_domain::{Deployment, DeploymentRequest, ModelLookup, ModelRegistry, PipelineError, ServingPlatform};
use serde_json::json;

/// Endpoint de predicción publicado por el gateway para un deployment.
pub fn prediction_endpoint(gateway: &str, namespace: &str, name: &str) -> String {
    format!("{}/seldon/{namespace}/{name}/api/v1.0/predictions", gateway.trim_end_matches('/'))
}

/// Crea o actualiza el deployment que sirve la versión vigente de un modelo.
#[derive(Clone)]
pub struct DeploymentTrigger {
    registry: Arc<dyn ModelRegistry>,
    serving: Arc<dyn ServingPlatform>,
}

impl std::fmt::Debug for DeploymentTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentTrigger").finish_non_exhaustive()
    }
}

impl DeploymentTrigger {
    pub fn new(registry: Arc<dyn ModelRegistry>, serving: Arc<dyn ServingPlatform>) -> Self {
        Self { registry, serving }
    }

    /// Devuelve el deployment aplicado; `endpoint` nunca es vacío.
    pub async fn deploy(&self,
                        name: &str,
                        namespace: &str,
                        model_name: &str,
                        serving_image: &str)
                        -> Result<Deployment, PipelineError> {
        for (field, value) in [("name", name), ("namespace", namespace), ("model", model_name), ("image", serving_image)] {
            if value.trim().is_empty() {
                return Err(PipelineError::Deployment(format!("empty deployment {field}")));
            }
        }
        let registry = Arc::clone(&self.registry);
        let model = model_name.to_string();
        let lookup = tokio::task::spawn_blocking(move || registry.lookup(&model))
            .await
            .map_err(|e| PipelineError::ModelRegistryUnavailable(format!("lookup task aborted: {e}")))??;
        let ModelLookup::Current(_, version) = lookup else {
            return Err(PipelineError::Deployment(format!("model '{model_name}' has no registered version")));
        };
        let request = DeploymentRequest { name: name.to_string(),
                                          namespace: namespace.to_string(),
                                          model_name: model_name.to_string(),
                                          model_version: version.version,
                                          checkpoint_uuid: version.checkpoint.uuid.clone(),
                                          serving_image: serving_image.to_string() };
        let deployment = self.serving.apply_deployment(&request).await?;
        if deployment.endpoint.is_empty() {
            return Err(PipelineError::Deployment(format!("platform returned no endpoint for {name}")));
        }
        info!("{} deployment {namespace}/{name} serving {model_name} v{} at {}",
              if deployment.created { "created" } else { "updated" },
              deployment.model_version,
              deployment.endpoint);
        Ok(deployment)
    }
}

/// Escribe un manifiesto `SeldonDeployment` por deployment en
/// `<dir>/<namespace>/<name>.json`.
#[derive(Debug, Clone)]
pub struct ManifestServingPlatform {
    dir: PathBuf,
    gateway: String,
}

impl ManifestServingPlatform {
    pub fn new(dir: impl Into<PathBuf>, gateway: impl Into<String>) -> Self {
        Self { dir: dir.into(),
               gateway: gateway.into() }
    }

    pub fn manifest_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.dir.join(namespace).join(format!("{name}.json"))
    }

    fn manifest(request: &DeploymentRequest) -> serde_json::Value {
        json!({
            "apiVersion": "machinelearning.seldon.io/v1",
            "kind": "SeldonDeployment",
            "metadata": {
                "name": request.name,
                "namespace": request.namespace,
                "labels": {
                    "promoflow/model": request.model_name,
                    "promoflow/version": request.model_version.to_string(),
                },
            },
            "spec": {
                "name": request.name,
                "predictors": [{
                    "name": "default",
                    "replicas": 1,
                    "graph": { "name": "classifier", "type": "MODEL", "children": [] },
                    "componentSpecs": [{
                        "spec": {
                            "containers": [{
                                "name": "classifier",
                                "image": request.serving_image,
                                "env": [
                                    { "name": "MODEL_NAME", "value": request.model_name },
                                    { "name": "MODEL_VERSION", "value": request.model_version.to_string() },
                                    { "name": "CHECKPOINT_UUID", "value": request.checkpoint_uuid },
                                ],
                            }],
                        },
                    }],
                }],
            },
        })
    }
}

#[async_trait]
impl ServingPlatform for ManifestServingPlatform {
    async fn apply_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, PipelineError> {
        let path = self.manifest_path(&request.namespace, &request.name);
        let created = !tokio::fs::try_exists(&path).await.unwrap_or(false);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await
                                             .map_err(|e| PipelineError::Deployment(format!("{}: {e}", parent.display())))?;
        }
        let body = serde_json::to_vec_pretty(&Self::manifest(request)).map_err(|e| PipelineError::Deployment(e.to_string()))?;
        tokio::fs::write(&path, body).await
                                     .map_err(|e| PipelineError::Deployment(format!("{}: {e}", path.display())))?;
        Ok(Deployment { name: request.name.clone(),
                        namespace: request.namespace.clone(),
                        model_name: request.model_name.clone(),
                        model_version: request.model_version,
                        serving_image: request.serving_image.clone(),
                        endpoint: prediction_endpoint(&self.gateway, &request.namespace, &request.name),
                        created })
    }
}
