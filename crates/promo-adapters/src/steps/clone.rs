use std::sync::Arc;

use async_trait::async_trait;
use promo_core::step::{StepKind, StepRunResultTyped, TypedStep};
use promo_domain::{RepoRef, SharedWorkspace, SourceFetcher};
use serde::{Deserialize, Serialize};

use crate::artifacts::WorkspaceArtifact;
use crate::PipelineParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneParams {
    pub repo_url: String,
    pub branch: String,
}

impl Default for CloneParams {
    fn default() -> Self {
        let p = PipelineParams::default();
        Self { repo_url: p.repo_url,
               branch: p.branch }
    }
}

/// Source: descarga el repositorio en el workspace compartido. Es el único
/// step que escribe en el workspace.
pub struct CloneRepoStep {
    fetcher: Arc<dyn SourceFetcher>,
    workspace: Arc<SharedWorkspace>,
}

impl CloneRepoStep {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, workspace: Arc<SharedWorkspace>) -> Self {
        Self { fetcher, workspace }
    }
}

impl std::fmt::Debug for CloneRepoStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneRepoStep").field("workspace", &self.workspace.root()).finish()
    }
}

#[async_trait]
impl TypedStep for CloneRepoStep {
    type Params = CloneParams;
    type Input = WorkspaceArtifact;
    type Output = WorkspaceArtifact;

    fn id(&self) -> &str {
        super::CLONE_STEP
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    async fn run_typed(&self, _input: Option<WorkspaceArtifact>, p: CloneParams) -> StepRunResultTyped<WorkspaceArtifact> {
        let repo = RepoRef { url: p.repo_url,
                             branch: p.branch };
        match self.fetcher.fetch(&repo, &self.workspace).await {
            Ok(dir) => StepRunResultTyped::single(WorkspaceArtifact { root: self.workspace.root().display().to_string(),
                                                                      repo_dir: dir.display().to_string(),
                                                                      repo_url: repo.url,
                                                                      branch: repo.branch,
                                                                      schema_version: 1 }),
            Err(e) => StepRunResultTyped::Failure { error: e.into() },
        }
    }
}
