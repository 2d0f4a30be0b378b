//! Implementaciones de `SourceFetcher`.
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use promo_domain::{PipelineError, RepoRef, SharedWorkspace, SourceFetcher};
use tokio::process::Command;

/// El destino debe no existir o estar vacío.
pub(crate) fn ensure_empty_target(target: &Path) -> Result<(), PipelineError> {
    match fs::read_dir(target) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                Err(PipelineError::Fetch(format!("target {} is already populated", target.display())))
            } else {
                Ok(())
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::Fetch(format!("{}: {e}", target.display()))),
    }
}

/// Clona con el binario `git`: `git clone --single-branch --branch <b> <url> <dir>`.
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    git: PathBuf,
}

impl Default for GitCliFetcher {
    fn default() -> Self {
        Self { git: PathBuf::from("git") }
    }
}

impl GitCliFetcher {
    pub fn with_binary(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl SourceFetcher for GitCliFetcher {
    async fn fetch(&self, repo: &RepoRef, workspace: &SharedWorkspace) -> Result<PathBuf, PipelineError> {
        let target = workspace.repo_dir();
        ensure_empty_target(&target)?;
        info!("cloning {} (branch {}) into {}", repo.url, repo.branch, target.display());
        let output = Command::new(&self.git).arg("clone")
                                            .arg("--single-branch")
                                            .arg("--branch")
                                            .arg(&repo.branch)
                                            .arg(&repo.url)
                                            .arg(&target)
                                            .output()
                                            .await
                                            .map_err(|e| PipelineError::Fetch(format!("cannot run {}: {e}", self.git.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Fetch(format!("git clone exited with {}: {}", output.status, stderr.trim())));
        }
        Ok(target)
    }
}

/// Copia recursiva de un directorio local (`repo.url` es la ruta; admite
/// prefijo `file://`). La rama se ignora.
#[derive(Debug, Clone, Default)]
pub struct LocalDirFetcher;

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

#[async_trait]
impl SourceFetcher for LocalDirFetcher {
    async fn fetch(&self, repo: &RepoRef, workspace: &SharedWorkspace) -> Result<PathBuf, PipelineError> {
        let source = PathBuf::from(repo.url.strip_prefix("file://").unwrap_or(&repo.url));
        if !source.is_dir() {
            return Err(PipelineError::Fetch(format!("{} is not a directory", source.display())));
        }
        let target = workspace.repo_dir();
        ensure_empty_target(&target)?;
        debug!("copying {} into {} (branch '{}' ignored)", source.display(), target.display(), repo.branch);
        let dest = target.clone();
        tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .map_err(|e| PipelineError::Fetch(format!("copy task aborted: {e}")))?
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        Ok(target)
    }
}
