// src/types.rs

//! Shared data types crossing the service/HTTP boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A package or file entry within a repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
    /// Path relative to the repository root.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 hex digest, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Aggregated repository details returned by `GET /repo/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub repo_type: String,
    pub package_count: usize,
    /// Count of `.rpm` entries by filename suffix, independent of the
    /// repository's declared type.
    pub rpm_count: usize,
    /// Count of `.deb` entries by filename suffix.
    pub deb_count: usize,
    pub total_size: u64,
    pub packages: Vec<PackageInfo>,
}

/// Repository listing with a nested directory tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoList {
    pub repositories: Vec<String>,
    pub tree: BTreeMap<String, RepoTreeNode>,
    pub count: usize,
}

/// Node in the repository tree: either a repo leaf or a directory grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoTreeNode {
    #[serde(rename = "type")]
    pub kind: TreeNodeKind,
    /// Full repository path; only set on repo nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub children: BTreeMap<String, RepoTreeNode>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeKind {
    Repo,
    Directory,
}

/// Build a nested tree out of flat repository paths.
///
/// A path that is both a repository and a prefix of deeper repositories
/// becomes a repo node with children.
pub fn build_repo_tree(repos: &[String]) -> BTreeMap<String, RepoTreeNode> {
    let mut root: BTreeMap<String, RepoTreeNode> = BTreeMap::new();

    for repo in repos {
        let segments: Vec<&str> = repo.split('/').collect();
        let mut current = &mut root;

        for (i, segment) in segments.iter().enumerate() {
            let is_leaf = i == segments.len() - 1;
            let node = current
                .entry(segment.to_string())
                .or_insert_with(|| RepoTreeNode {
                    kind: TreeNodeKind::Directory,
                    path: None,
                    children: BTreeMap::new(),
                });
            if is_leaf {
                node.kind = TreeNodeKind::Repo;
                node.path = Some(repo.clone());
            }
            current = &mut node.children;
        }
    }

    root
}

/// Per-file result of a batch upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFileResult {
    pub filename: String,
    pub status: BatchFileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchFileStatus {
    Success,
    Failed,
}

/// Outcome of a batch upload. Partial failure is a result shape, not an
/// error: the transport-level call succeeds and callers inspect per-file
/// results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<BatchFileResult>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<BatchFileResult>) -> Self {
        let success = results
            .iter()
            .filter(|r| r.status == BatchFileStatus::Success)
            .count();
        Self {
            total: results.len(),
            success,
            failed: results.len() - success,
            results,
        }
    }
}

/// Checksum lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageChecksum {
    pub repo: String,
    pub filename: String,
    pub sha256: String,
}
