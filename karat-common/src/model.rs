//! Appraisal domain models
//!
//! An `Appraisal` is the status-wrapped result of analyzing one project:
//! either a full folder-contribution tree or a captured failure. It is
//! created once by the worker pipeline, serialized into the cache, and
//! never mutated afterwards (re-runs supersede it at the same key).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Worker-side failure captured into a cached error appraisal when the
/// clone stage fails.
pub const ERROR_TYPE_CLONE_FAILED: &str = "clone_failed";

/// Worker-side failure captured into a cached error appraisal when the
/// contribution analyzer fails.
pub const ERROR_TYPE_APPRAISAL_FAILED: &str = "appraisal_failed";

/// Opaque project identity: enough to build a cache key and a clone URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub owner: String,
    pub name: String,
}

impl ProjectRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Cache key for the whole-project appraisal. The trailing slash is
    /// part of the key. Always root-level: one computation serves every
    /// folder-level request for the project.
    pub fn cache_key(&self) -> String {
        format!("appraisal:{}/{}/", self.owner, self.name)
    }

    /// `owner/name` form for logging and checkout directory layout.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Per-file contribution record directly inside a folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCredit {
    pub path: String,
    pub line_count: u64,
    /// Fractional attribution per contributor; shares sum to 1.0.
    pub credit_share: BTreeMap<String, f64>,
}

/// One node of the folder-contribution tree. The root node has path `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderNode {
    pub path: String,
    pub line_count: u64,
    pub total_credits: f64,
    /// Fractional attribution per contributor at this node; sums to 1.0.
    pub credit_share: BTreeMap<String, f64>,
    /// File records directly in this folder (not in subfolders).
    pub base_files: Vec<FileCredit>,
    /// Direct children, in directory order. Order round-trips.
    pub subfolders: Vec<FolderNode>,
    /// Contributor identities appearing anywhere under this node.
    pub contributors: Vec<String>,
}

impl FolderNode {
    /// Invariant check: a node's line count equals the sum of its base
    /// files plus the sum of its subfolders, recursively.
    pub fn line_counts_consistent(&self) -> bool {
        let files: u64 = self.base_files.iter().map(|f| f.line_count).sum();
        let folders: u64 = self.subfolders.iter().map(|s| s.line_count).sum();
        self.line_count == files + folders
            && self.subfolders.iter().all(FolderNode::line_counts_consistent)
    }
}

/// Result of analyzing one project at one folder path.
///
/// Internally tagged on `status`: the success arm serializes `folder` and
/// nothing error-shaped; the error arm serializes `error_type`/`message`
/// and no tree. Exactly one of the two shapes exists on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Appraisal {
    Ok {
        project: ProjectRef,
        folder_path: String,
        folder: FolderNode,
    },
    Error {
        project: ProjectRef,
        folder_path: String,
        error_type: String,
        message: String,
    },
}

impl Appraisal {
    /// Success appraisal for a project's root folder.
    pub fn ok(project: ProjectRef, folder: FolderNode) -> Self {
        Appraisal::Ok {
            project,
            folder_path: String::new(),
            folder,
        }
    }

    /// Error appraisal for a project's root folder.
    pub fn error(project: ProjectRef, error_type: &str, message: impl Into<String>) -> Self {
        Appraisal::Error {
            project,
            folder_path: String::new(),
            error_type: error_type.to_string(),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Appraisal::Ok { .. })
    }

    pub fn project(&self) -> &ProjectRef {
        match self {
            Appraisal::Ok { project, .. } => project,
            Appraisal::Error { project, .. } => project,
        }
    }

    pub fn folder_path(&self) -> &str {
        match self {
            Appraisal::Ok { folder_path, .. } => folder_path,
            Appraisal::Error { folder_path, .. } => folder_path,
        }
    }
}

/// A unit of work placed on the queue by the read path on cache miss.
///
/// `folder_path` is always `""`: the worker computes the whole-project
/// tree regardless of which subfolder the client originally asked for.
/// The correlation id doubles as the progress channel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppraisalJob {
    pub project: ProjectRef,
    pub folder_path: String,
    #[serde(rename = "id")]
    pub correlation_id: String,
}

impl AppraisalJob {
    pub fn for_root(project: ProjectRef, correlation_id: impl Into<String>) -> Self {
        Self {
            project,
            folder_path: String::new(),
            correlation_id: correlation_id.into(),
        }
    }
}
