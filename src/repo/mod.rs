// src/repo/mod.rs

//! Repository types and the repo registry
//!
//! A [`Repo`] wraps a [`Storage`] backend with the package-format
//! conventions of one repository type: where packages land, which file
//! extensions are accepted, and how repository metadata is generated.
//! One `Repo` instance serves every repository of its type; the
//! repository name is passed to each operation.

use crate::error::{Error, Result};
use crate::storage::{FileInfo, ListOptions, Storage, StorageRegistry};
use crate::types::PackageInfo;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub mod deb;
pub mod files;
mod generator;
mod primary;
pub mod rpm;

/// Marker object a files repository drops at its root so it survives
/// type inference across restarts.
pub const REPO_TYPE_MARKER: &str = ".repo-type";

/// Repository type, in inference priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepoType {
    Files,
    Rpm,
    Deb,
}

/// Scan order for type inference. The explicit marker outranks the
/// structural checks, so [`RepoType::Files`] goes first.
pub const INFERENCE_ORDER: [RepoType; 3] = [RepoType::Files, RepoType::Rpm, RepoType::Deb];

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Rpm => "rpm",
            RepoType::Deb => "deb",
            RepoType::Files => "files",
        }
    }

    /// Label under which this type's storage backend is registered.
    pub fn storage_label(&self) -> &'static str {
        self.as_str()
    }

    /// Package extension this type accepts, or `None` for any.
    pub fn package_extension(&self) -> Option<&'static str> {
        match self {
            RepoType::Rpm => Some(".rpm"),
            RepoType::Deb => Some(".deb"),
            RepoType::Files => None,
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rpm" => Ok(RepoType::Rpm),
            "deb" => Ok(RepoType::Deb),
            "files" => Ok(RepoType::Files),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

/// Format-specific behavior over one storage backend.
pub trait Repo: Send + Sync {
    fn kind(&self) -> RepoType;

    /// Create the repository layout. Creating an existing repository is
    /// a no-op.
    fn create_repo(&self, name: &str) -> Result<()>;

    /// Remove the repository and everything in it. Idempotent.
    fn delete_repo(&self, name: &str) -> Result<()>;

    /// Whether a repository of this type exists under `name`.
    fn repo_exists(&self, name: &str) -> Result<bool>;

    /// Names of repositories of this type found in storage.
    fn list_repos(&self) -> Result<Vec<String>>;

    /// Store one package. Types with a package extension reject other
    /// filenames here, independent of the service-level gate.
    fn upload_package(&self, name: &str, filename: &str, reader: &mut dyn Read) -> Result<()>;

    fn download_package(&self, name: &str, filename: &str) -> Result<Box<dyn Read + Send>>;

    fn delete_package(&self, name: &str, filename: &str) -> Result<()>;

    fn list_packages(&self, name: &str) -> Result<Vec<PackageInfo>>;

    /// Regenerate repository metadata after uploads or deletes.
    fn refresh_metadata(&self, name: &str) -> Result<()>;

    /// Metadata files currently published for the repository.
    fn get_metadata(&self, name: &str) -> Result<Vec<FileInfo>>;

    /// Open one published metadata file for reading. `path` is relative
    /// to the repository root and must name a metadata artifact of this
    /// type.
    fn open_metadata(&self, name: &str, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Hex SHA-256 of one package, from whatever source the type keeps
    /// it in. An empty string means the type does not track checksums.
    fn package_checksum(&self, name: &str, filename: &str) -> Result<String>;

    /// Storage-specific location string for a path inside a repository.
    fn location(&self, name: &str, path: &str) -> String;
}

pub type RepoCtor = fn(Box<dyn Storage>) -> Box<dyn Repo>;

struct Registration {
    kind: RepoType,
    ctor: RepoCtor,
}

/// Registry of repo constructors. Mirrors [`StorageRegistry`]:
/// registration is first-wins, a duplicate kind is silently ignored.
pub struct RepoRegistry {
    registrations: Vec<Registration>,
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RepoType::Rpm, rpm::construct);
        registry.register(RepoType::Deb, deb::construct);
        registry.register(RepoType::Files, files::construct);
        registry
    }

    pub fn register(&mut self, kind: RepoType, ctor: RepoCtor) {
        if self.registrations.iter().any(|r| r.kind == kind) {
            debug!(%kind, "repo constructor already registered, ignoring");
            return;
        }
        self.registrations.push(Registration { kind, ctor });
    }

    pub fn create(&self, kind: RepoType, storage: Box<dyn Storage>) -> Result<Box<dyn Repo>> {
        let reg = self
            .registrations
            .iter()
            .find(|r| r.kind == kind)
            .ok_or_else(|| Error::UnsupportedType(kind.to_string()))?;
        Ok((reg.ctor)(storage))
    }

    /// Build one repo per registered type, each over the storage backend
    /// its type label selects.
    pub fn build_all(
        &self,
        storages: &StorageRegistry,
        base: &Path,
    ) -> Result<HashMap<RepoType, Box<dyn Repo>>> {
        let mut repos = HashMap::new();
        for reg in &self.registrations {
            let storage = storages.create_by_label(base, reg.kind.storage_label())?;
            repos.insert(reg.kind, (reg.ctor)(storage));
        }
        Ok(repos)
    }
}

impl Default for RepoRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Shared listing helper: every directory under the backend root, at
/// any depth. Repository names are paths, so candidates have to come
/// from a recursive scan, not just the top level.
fn repo_dirs(storage: &dyn Storage) -> Result<Vec<FileInfo>> {
    storage.list_with_options("", &ListOptions::unlimited().with_dirs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_type_round_trip() {
        for ty in [RepoType::Rpm, RepoType::Deb, RepoType::Files] {
            assert_eq!(ty.as_str().parse::<RepoType>().unwrap(), ty);
        }
        assert_eq!("RPM".parse::<RepoType>().unwrap(), RepoType::Rpm);
    }

    #[test]
    fn test_repo_type_unknown() {
        let err = "gem".parse::<RepoType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_inference_order_marker_first() {
        assert_eq!(INFERENCE_ORDER[0], RepoType::Files);
    }

    #[test]
    fn test_registry_first_wins() {
        fn alt(_s: Box<dyn Storage>) -> Box<dyn Repo> {
            unreachable!("duplicate registration must be ignored")
        }
        let mut registry = RepoRegistry::with_defaults();
        registry.register(RepoType::Rpm, alt);

        let storage = crate::storage::local::construct(
            tempfile::tempdir().unwrap().path(),
        )
        .unwrap();
        let repo = registry.create(RepoType::Rpm, storage).unwrap();
        assert_eq!(repo.kind(), RepoType::Rpm);
    }

    #[test]
    fn test_registry_unknown_type() {
        let registry = RepoRegistry::new();
        let storage =
            crate::storage::local::construct(tempfile::tempdir().unwrap().path()).unwrap();
        assert!(matches!(
            registry.create(RepoType::Deb, storage).map(|_| ()).unwrap_err(),
            Error::UnsupportedType(_)
        ));
    }
}
