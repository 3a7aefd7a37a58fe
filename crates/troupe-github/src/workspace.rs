// Local git checkout of an installation's repository
//
// All operations shell out to git. The caller (WorkspaceManager) holds the
// process-wide filesystem lock, so a GitWorkspace never races another one.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use troupe_core::messages::CodeOutput;
use troupe_core::{Error, Result};

pub struct GitWorkspace {
    root_dir: PathBuf,
}

impl GitWorkspace {
    /// Clone the repository into `root_dir` if it is not there yet, and
    /// point its origin at the (token-carrying) url either way.
    pub async fn setup(root_dir: impl Into<PathBuf>, repo_url: &str) -> Result<Self> {
        let root_dir = root_dir.into();
        let workspace = Self { root_dir };

        if workspace.root_dir.join(".git").exists() {
            workspace
                .git(&["remote", "set-url", "origin", repo_url])
                .await?;
        } else {
            tokio::fs::create_dir_all(&workspace.root_dir)
                .await
                .map_err(|e| Error::Generic(anyhow::anyhow!("create workspace dir: {e}")))?;
            run_git_in(
                workspace
                    .root_dir
                    .parent()
                    .unwrap_or(Path::new(".")),
                &[
                    "clone",
                    repo_url,
                    workspace
                        .root_dir
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("."),
                ],
            )
            .await?;
        }
        Ok(workspace)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Discard local state and match the remote default branch
    pub async fn force_to_latest(&self, default_branch: &str) -> Result<()> {
        self.git(&["fetch", "origin"]).await?;
        self.git(&["checkout", default_branch]).await?;
        self.git(&["reset", "--hard", &format!("origin/{default_branch}")])
            .await?;
        Ok(())
    }

    /// Switch to a working branch, creating it if needed
    pub async fn checkout_branch(&self, branch: &str) -> Result<()> {
        if self.git(&["checkout", branch]).await.is_err() {
            self.git(&["checkout", "-b", branch]).await?;
        }
        // Pick up remote progress on the branch when it exists
        let _ = self.git(&["pull", "--ff-only", "origin", branch]).await;
        Ok(())
    }

    /// Write the reported file changes into the checkout
    pub async fn apply(&self, outputs: &[CodeOutput]) -> Result<()> {
        for output in outputs {
            let path = self.safe_path(&output.file_path)?;
            match output.kind.as_str() {
                "new_file" | "modified_file" => {
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(|e| {
                            Error::Generic(anyhow::anyhow!("create dirs for {path:?}: {e}"))
                        })?;
                    }
                    tokio::fs::write(&path, &output.content)
                        .await
                        .map_err(|e| Error::Generic(anyhow::anyhow!("write {path:?}: {e}")))?;
                }
                "deleted_file" => {
                    if path.exists() {
                        tokio::fs::remove_file(&path)
                            .await
                            .map_err(|e| Error::Generic(anyhow::anyhow!("remove {path:?}: {e}")))?;
                    }
                }
                other => {
                    tracing::warn!(kind = %other, path = %output.file_path, "skipping unknown code output kind");
                }
            }
        }
        Ok(())
    }

    pub async fn commit_and_push(&self, branch: &str, message: &str) -> Result<()> {
        self.git(&["add", "-A"]).await?;
        // An empty diff is not an error; there is just nothing to push
        if self.git(&["diff", "--cached", "--quiet"]).await.is_ok() {
            tracing::debug!(branch = %branch, "no changes to commit");
            return Ok(());
        }
        self.git(&["commit", "-m", message]).await?;
        self.git(&["push", "origin", branch]).await?;
        Ok(())
    }

    /// Reject paths that would escape the checkout
    fn safe_path(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::invalid_event(format!(
                "refusing path outside workspace: {}",
                relative.display()
            )));
        }
        Ok(self.root_dir.join(relative))
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git_in(&self.root_dir, args).await
    }
}

async fn run_git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Generic(anyhow::anyhow!("could not run git: {e}")))?;
    if !output.status.success() {
        return Err(Error::Generic(anyhow::anyhow!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_at(dir: &Path) -> GitWorkspace {
        GitWorkspace {
            root_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn apply_writes_creates_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_at(dir.path());

        workspace
            .apply(&[
                CodeOutput {
                    kind: "new_file".to_string(),
                    file_path: "src/lib.rs".to_string(),
                    content: "pub fn hello() {}\n".to_string(),
                },
                CodeOutput {
                    kind: "new_file".to_string(),
                    file_path: "README.md".to_string(),
                    content: "# hi\n".to_string(),
                },
            ])
            .await
            .unwrap();
        assert!(dir.path().join("src/lib.rs").exists());

        workspace
            .apply(&[CodeOutput {
                kind: "deleted_file".to_string(),
                file_path: "README.md".to_string(),
                content: String::new(),
            }])
            .await
            .unwrap();
        assert!(!dir.path().join("README.md").exists());
    }

    #[tokio::test]
    async fn apply_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_at(dir.path());

        let err = workspace
            .apply(&[CodeOutput {
                kind: "new_file".to_string(),
                file_path: "../outside.txt".to_string(),
                content: String::new(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }
}
