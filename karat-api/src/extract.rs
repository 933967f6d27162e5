//! Subfolder extraction from a cached whole-project appraisal
//!
//! The cache always holds the full project tree at one root-level key;
//! folder-level requests are answered by pulling the named subtree out of
//! that cached value. A pure, restartable tree search: no index, worst
//! case O(tree size), bounded by the size-eligibility gate upstream.
//!
//! Absent paths, unparseable input, and error appraisals all yield
//! `None`, never an error. An error appraisal cached at the root has no
//! tree, so subfolder requests against it must not fabricate data.

use karat_common::model::{Appraisal, FolderNode};

/// Strip exactly one leading and one trailing slash, if present.
/// `"app/domain/"`, `"/app/domain"` and `"app/domain"` normalize alike;
/// the empty result means the project root.
pub fn normalize(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Extract the appraisal for `folder_path` out of the cached root-level
/// appraisal JSON. Returns `None` when the input is empty or
/// unparseable, when the cached appraisal is an error, or when no node
/// matches the path.
pub fn extract(cached_json: &str, folder_path: &str) -> Option<Appraisal> {
    if cached_json.trim().is_empty() {
        return None;
    }

    let appraisal: Appraisal = serde_json::from_str(cached_json).ok()?;
    let (project, root) = match appraisal {
        Appraisal::Ok { project, folder, .. } => (project, folder),
        Appraisal::Error { .. } => return None,
    };

    let target = normalize(folder_path);
    if target.is_empty() {
        return Some(Appraisal::Ok {
            project,
            folder_path: String::new(),
            folder: root,
        });
    }

    let node = find_node(&root, target)?.clone();
    Some(Appraisal::Ok {
        project,
        folder_path: target.to_string(),
        folder: node,
    })
}

/// Descend the subfolder tree looking for the node whose full normalized
/// path equals `target`. Node paths are full paths from the project
/// root, unique within a tree by construction, so matching never needs a
/// relative remainder.
fn find_node<'a>(node: &'a FolderNode, target: &str) -> Option<&'a FolderNode> {
    for child in &node.subfolders {
        let child_path = normalize(&child.path);
        if child_path == target {
            return Some(child);
        }
        if target.len() > child_path.len()
            && target.starts_with(child_path)
            && target.as_bytes()[child_path.len()] == b'/'
        {
            if let Some(found) = find_node(child, target) {
                return Some(found);
            }
        }
    }
    None
}
