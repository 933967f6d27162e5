//! Git gateway
//!
//! Owns the local checkout layout and the streaming clone. Each project
//! gets one checkout directory under the clone root; a checkout that
//! appears between the existence check and the clone belongs to another
//! worker, and overwriting it would corrupt that worker's run; the
//! gateway refuses and the error is fatal for this run.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use karat_common::model::ProjectRef;

#[derive(Debug, Error)]
pub enum GitError {
    /// Another worker owns this checkout. Fatal for the current run.
    #[error("Cannot overwrite existing local checkout at {0}")]
    CheckoutExists(PathBuf),

    /// Failed to launch or talk to the git process.
    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),

    /// git clone exited unsuccessfully.
    #[error("Clone failed: {0}")]
    CloneFailed(String),
}

/// Seam to the git tooling: checkout layout plus streaming clone.
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Local checkout directory for the project.
    fn checkout_path(&self, project: &ProjectRef) -> PathBuf;

    /// Whether a local working copy already exists.
    fn local_copy_exists(&self, project: &ProjectRef) -> bool;

    /// Clone the project, sending each raw progress line on `output` as
    /// it arrives.
    async fn clone_streaming(
        &self,
        project: &ProjectRef,
        output: UnboundedSender<String>,
    ) -> Result<(), GitError>;
}

/// Gateway backed by the `git` command-line tool.
pub struct CliGitGateway {
    clone_root: PathBuf,
}

impl CliGitGateway {
    pub fn new(clone_root: impl Into<PathBuf>) -> Self {
        Self {
            clone_root: clone_root.into(),
        }
    }

    fn clone_url(project: &ProjectRef) -> String {
        format!("https://github.com/{}/{}.git", project.owner, project.name)
    }
}

#[async_trait]
impl GitGateway for CliGitGateway {
    fn checkout_path(&self, project: &ProjectRef) -> PathBuf {
        self.clone_root.join(&project.owner).join(&project.name)
    }

    fn local_copy_exists(&self, project: &ProjectRef) -> bool {
        self.checkout_path(project).exists()
    }

    async fn clone_streaming(
        &self,
        project: &ProjectRef,
        output: UnboundedSender<String>,
    ) -> Result<(), GitError> {
        let dest = self.checkout_path(project);
        if dest.exists() {
            return Err(GitError::CheckoutExists(dest));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = Self::clone_url(project);
        debug!(project = %project.slug(), url = %url, "Starting clone");

        // git writes progress to stderr, terminating in-progress lines
        // with \r and final lines with \n.
        let mut child = Command::new("git")
            .arg("clone")
            .arg("--progress")
            .arg(&url)
            .arg(&dest)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| GitError::CloneFailed("stderr unavailable".to_string()))?;

        let mut buf = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::new();
        let mut tail: Vec<String> = Vec::new();
        loop {
            let n = stderr.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending).to_string();
                        if tail.len() >= 5 {
                            tail.remove(0);
                        }
                        tail.push(line.clone());
                        let _ = output.send(line);
                        pending.clear();
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending).to_string();
            tail.push(line.clone());
            let _ = output.send(line);
        }

        let status = child.wait().await?;
        if !status.success() {
            // Drop any partial checkout so a retry starts clean.
            if dest.exists() {
                if let Err(e) = std::fs::remove_dir_all(&dest) {
                    warn!(path = %dest.display(), error = %e, "Failed to remove partial checkout");
                }
            }
            return Err(GitError::CloneFailed(format!(
                "git exited with {}: {}",
                status,
                tail.join(" | ")
            )));
        }

        Ok(())
    }
}
