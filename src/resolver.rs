// src/resolver.rs

//! Routed-path resolution for the repository surface
//!
//! Repository names are multi-segment paths, so `/repo/a/b/upload` is
//! ambiguous between "repository `a/b`, verb upload" and "repository
//! `a/b/upload`". Patterns are therefore tried in a fixed priority
//! order: verb suffixes first, then format-specific prefixes, then the
//! bare repository path. The resolver only classifies paths; handlers
//! own method checks beyond the coarse mapping here.

use regex::Regex;
use std::sync::LazyLock;

/// What a routed path under `/repo/` asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// `POST /repo/{repo}/upload` (single or multipart batch).
    Upload { repo: String },
    /// `POST /repo/{repo}/refresh`
    Refresh { repo: String },
    /// `GET /repo/{repo}/checksum/{filename}`
    Checksum { repo: String, filename: String },
    /// `GET /repo/{repo}/rpm/{filename}` and `/deb/{filename}`
    DownloadPackage { repo: String, filename: String },
    /// `GET /repo/{repo}/repodata/{path}` and the apt index files at
    /// the repository root.
    Metadata { repo: String, path: String },
    /// `GET /repo/{repo}/files/{path}`: artifact access in a files
    /// repository (a trailing empty path lists the repository).
    RepoFile { repo: String, path: String },
    /// `GET /repo/{repo}` / `DELETE /repo/{repo}`
    RepoInfo { repo: String },
    DeleteRepo { repo: String },
}

static UPLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/upload$").unwrap());
static REFRESH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/refresh$").unwrap());
static CHECKSUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/checksum/([^/]+)$").unwrap());
static DOWNLOAD_RPM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/rpm/([^/]+)$").unwrap());
static DOWNLOAD_DEB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/deb/([^/]+)$").unwrap());
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/repodata/(.+)$").unwrap());
static DEB_METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/(.+)/(Packages|Packages\.gz|Release)$").unwrap());
static REPO_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/([^/]+(?:/[^/]+)*)/files/?(.*)$").unwrap());
static REPO_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/repo/([^/]+(?:/[^/]+)*)$").unwrap());

/// Verb suffixes that a bare repository path can never end in.
const RESERVED_SUFFIXES: [&str; 4] = ["/upload", "/refresh", "/files", "/browse"];

/// Classify a `/repo/...` path for one HTTP method. `None` means the
/// path matches nothing this surface serves.
pub fn resolve(method: &str, path: &str) -> Option<RouteTarget> {
    // The files prefix wins over everything else so a files repository
    // can contain entries named `upload` or `repodata`.
    if method == "GET" && path.contains("/files") {
        if let Some(caps) = REPO_FILES.captures(path) {
            return Some(RouteTarget::RepoFile {
                repo: caps[1].to_string(),
                path: caps[2].to_string(),
            });
        }
    }

    if method == "POST" {
        if let Some(caps) = UPLOAD.captures(path) {
            return Some(RouteTarget::Upload {
                repo: caps[1].to_string(),
            });
        }
        if let Some(caps) = REFRESH.captures(path) {
            return Some(RouteTarget::Refresh {
                repo: caps[1].to_string(),
            });
        }
    }

    if method == "GET" {
        if let Some(caps) = CHECKSUM.captures(path) {
            return Some(RouteTarget::Checksum {
                repo: caps[1].to_string(),
                filename: caps[2].to_string(),
            });
        }
        for pattern in [&DOWNLOAD_RPM, &DOWNLOAD_DEB] {
            if let Some(caps) = pattern.captures(path) {
                return Some(RouteTarget::DownloadPackage {
                    repo: caps[1].to_string(),
                    filename: caps[2].to_string(),
                });
            }
        }
        if let Some(caps) = METADATA.captures(path) {
            return Some(RouteTarget::Metadata {
                repo: caps[1].to_string(),
                path: format!("repodata/{}", &caps[2]),
            });
        }
        if let Some(caps) = DEB_METADATA.captures(path) {
            return Some(RouteTarget::Metadata {
                repo: caps[1].to_string(),
                path: caps[2].to_string(),
            });
        }
    }

    if let Some(caps) = REPO_INFO.captures(path) {
        let repo = caps[1].to_string();
        let padded = format!("/{}/", repo);
        if RESERVED_SUFFIXES
            .iter()
            .any(|s| padded.contains(&format!("{}/", s)))
        {
            return None;
        }
        match method {
            "GET" => return Some(RouteTarget::RepoInfo { repo }),
            "DELETE" => return Some(RouteTarget::DeleteRepo { repo }),
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_suffixes_win_over_repo_path() {
        assert_eq!(
            resolve("POST", "/repo/centos/7/x86_64/upload"),
            Some(RouteTarget::Upload {
                repo: "centos/7/x86_64".into()
            })
        );
        assert_eq!(
            resolve("POST", "/repo/a/refresh"),
            Some(RouteTarget::Refresh { repo: "a".into() })
        );
    }

    #[test]
    fn test_download_and_checksum() {
        assert_eq!(
            resolve("GET", "/repo/el9/rpm/tool-1.0-1.x86_64.rpm"),
            Some(RouteTarget::DownloadPackage {
                repo: "el9".into(),
                filename: "tool-1.0-1.x86_64.rpm".into()
            })
        );
        assert_eq!(
            resolve("GET", "/repo/apt/stable/deb/tool_1.0_amd64.deb"),
            Some(RouteTarget::DownloadPackage {
                repo: "apt/stable".into(),
                filename: "tool_1.0_amd64.deb".into()
            })
        );
        assert_eq!(
            resolve("GET", "/repo/el9/checksum/tool-1.0-1.x86_64.rpm"),
            Some(RouteTarget::Checksum {
                repo: "el9".into(),
                filename: "tool-1.0-1.x86_64.rpm".into()
            })
        );
    }

    #[test]
    fn test_metadata_paths() {
        assert_eq!(
            resolve("GET", "/repo/el9/repodata/repomd.xml"),
            Some(RouteTarget::Metadata {
                repo: "el9".into(),
                path: "repodata/repomd.xml".into()
            })
        );
        assert_eq!(
            resolve("GET", "/repo/apt/stable/Packages.gz"),
            Some(RouteTarget::Metadata {
                repo: "apt/stable".into(),
                path: "Packages.gz".into()
            })
        );
    }

    #[test]
    fn test_files_prefix_wins() {
        assert_eq!(
            resolve("GET", "/repo/blobs/files/builds/v1/app.tar.gz"),
            Some(RouteTarget::RepoFile {
                repo: "blobs".into(),
                path: "builds/v1/app.tar.gz".into()
            })
        );
        // Even an entry that looks like a verb suffix.
        assert_eq!(
            resolve("GET", "/repo/blobs/files/upload"),
            Some(RouteTarget::RepoFile {
                repo: "blobs".into(),
                path: "upload".into()
            })
        );
        // Empty tail lists the repository.
        assert_eq!(
            resolve("GET", "/repo/blobs/files/"),
            Some(RouteTarget::RepoFile {
                repo: "blobs".into(),
                path: String::new()
            })
        );
    }

    #[test]
    fn test_repo_info_and_delete() {
        assert_eq!(
            resolve("GET", "/repo/centos/7/x86_64"),
            Some(RouteTarget::RepoInfo {
                repo: "centos/7/x86_64".into()
            })
        );
        assert_eq!(
            resolve("DELETE", "/repo/blobs"),
            Some(RouteTarget::DeleteRepo {
                repo: "blobs".into()
            })
        );
    }

    #[test]
    fn test_reserved_suffixes_never_resolve_as_repo() {
        // Wrong method for a verb path must not fall through to the
        // repo-info pattern.
        assert_eq!(resolve("GET", "/repo/a/upload"), None);
        assert_eq!(resolve("DELETE", "/repo/a/refresh"), None);
    }

    #[test]
    fn test_unroutable() {
        assert_eq!(resolve("GET", "/repos"), None);
        assert_eq!(resolve("PUT", "/repo/a"), None);
        assert_eq!(resolve("GET", "/repo/"), None);
    }
}
