//! Contribution analyzer seam
//!
//! The blame-based credit computation lives outside this service. The
//! trait is the boundary; `CommandAnalyzer` drives the configured
//! external tool, which receives a checkout path and prints the
//! folder-contribution tree as JSON on stdout.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use karat_common::model::{FolderNode, ProjectRef};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Analyzer binary not found in PATH
    #[error("Analyzer binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to execute the analyzer command
    #[error("Failed to execute analyzer: {0}")]
    Execution(String),

    /// Analyzer ran and reported failure
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// Analyzer output was not a valid contribution tree
    #[error("Failed to parse analyzer output: {0}")]
    Parse(String),
}

/// Produces the whole-project contribution tree for a local checkout.
#[async_trait]
pub trait ContributionAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        project: &ProjectRef,
        checkout: &Path,
    ) -> Result<FolderNode, AnalyzerError>;
}

/// Analyzer backed by an external command-line tool.
pub struct CommandAnalyzer {
    command: String,
}

impl CommandAnalyzer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ContributionAnalyzer for CommandAnalyzer {
    async fn analyze(
        &self,
        project: &ProjectRef,
        checkout: &Path,
    ) -> Result<FolderNode, AnalyzerError> {
        debug!(project = %project.slug(), checkout = %checkout.display(), "Running analyzer");

        let output = Command::new(&self.command)
            .arg(checkout)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AnalyzerError::BinaryNotFound(self.command.clone()),
                _ => AnalyzerError::Execution(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Failed(stderr.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| AnalyzerError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_distinguishable() {
        let analyzer = CommandAnalyzer::new("karat-no-such-binary");
        let project = ProjectRef::new("octocat", "hello");

        let err = analyzer.analyze(&project, Path::new("/tmp")).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::BinaryNotFound(_)));
    }
}
