// src/service.rs

//! Repository service: name-to-type dispatch over the repo instances
//!
//! One service owns one repo instance per type and a memo mapping
//! repository names to their type. Operations resolve the type from the
//! memo, falling back to a structural inference scan across the repo
//! instances; the scan result is memoized so inference runs at most once
//! per name per process lifetime.

use crate::error::{Error, Result};
use crate::name::RepoName;
use crate::repo::{Repo, RepoRegistry, RepoType, INFERENCE_ORDER};
use crate::storage::{FileInfo, StorageRegistry};
use crate::types::{
    BatchFileResult, BatchFileStatus, BatchOutcome, PackageInfo, RepoInfo,
};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

pub struct RepoService {
    repos: HashMap<RepoType, Box<dyn Repo>>,
    /// Memoized repository types. The write lock is held across mutating
    /// repo delegation, so concurrent mutations of the same service are
    /// serialized and readers never observe a half-applied create or
    /// delete.
    types: RwLock<HashMap<String, RepoType>>,
}

impl RepoService {
    pub fn new(repos: HashMap<RepoType, Box<dyn Repo>>) -> Self {
        Self {
            repos,
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Build the default service over `base`: one repo per registered
    /// type, each on the storage backend its label selects.
    pub fn from_defaults(base: &Path) -> Result<Self> {
        let storages = StorageRegistry::with_defaults();
        let repos = RepoRegistry::with_defaults().build_all(&storages, base)?;
        Ok(Self::new(repos))
    }

    fn read_types(&self) -> RwLockReadGuard<'_, HashMap<String, RepoType>> {
        self.types.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_types(&self) -> RwLockWriteGuard<'_, HashMap<String, RepoType>> {
        self.types.write().unwrap_or_else(|e| e.into_inner())
    }

    fn repo(&self, ty: RepoType) -> Result<&dyn Repo> {
        self.repos
            .get(&ty)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::UnsupportedType(ty.to_string()))
    }

    /// Memo lookup, then inference scan. The scan asks each repo type in
    /// priority order whether the name looks like one of its
    /// repositories; the first claim wins and is memoized.
    fn resolve(&self, name: &str) -> Result<RepoType> {
        if let Some(ty) = self.read_types().get(name).copied() {
            return Ok(ty);
        }

        let mut types = self.write_types();
        // Another caller may have inferred while we waited for the lock.
        if let Some(ty) = types.get(name).copied() {
            return Ok(ty);
        }
        for ty in INFERENCE_ORDER {
            let Some(repo) = self.repos.get(&ty) else {
                continue;
            };
            if repo.repo_exists(name)? {
                debug!(repo = name, %ty, "inferred repository type");
                types.insert(name.to_string(), ty);
                return Ok(ty);
            }
        }
        Err(Error::NotFound(format!("repository {}", name)))
    }

    /// Resolved type for a repository, inferring if necessary.
    pub fn repo_type(&self, name: &str) -> Result<RepoType> {
        self.resolve(name)
    }

    /// Pin a repository's type, overriding memo and inference.
    pub fn set_repo_type(&self, name: &str, ty: RepoType) -> Result<()> {
        let name = RepoName::parse(name)?;
        self.repo(ty)?;
        self.write_types().insert(name.as_str().to_string(), ty);
        Ok(())
    }

    pub fn create_repo(&self, name: &str, ty: RepoType) -> Result<()> {
        let name = RepoName::parse(name)?;
        let repo = self.repo(ty)?;
        let mut types = self.write_types();
        repo.create_repo(name.as_str())?;
        // Creation rebinds the name even if it was previously memoized
        // as another type.
        types.insert(name.as_str().to_string(), ty);
        info!(repo = %name, %ty, "repository created");
        Ok(())
    }

    /// Delete a repository. Deleting a name no repo claims is a no-op.
    pub fn delete_repo(&self, name: &str) -> Result<()> {
        let ty = match self.resolve(name) {
            Ok(ty) => ty,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        let repo = self.repo(ty)?;
        let mut types = self.write_types();
        repo.delete_repo(name)?;
        types.remove(name);
        info!(repo = name, %ty, "repository deleted");
        Ok(())
    }

    /// All known repositories: every type's structural listing plus any
    /// memoized names the listings missed. Structural hits back-fill the
    /// memo.
    pub fn list_repos(&self) -> Result<Vec<String>> {
        let mut found: Vec<(String, RepoType)> = Vec::new();
        for ty in INFERENCE_ORDER {
            let Some(repo) = self.repos.get(&ty) else {
                continue;
            };
            for name in repo.list_repos()? {
                if !found.iter().any(|(n, _)| n == &name) {
                    found.push((name, ty));
                }
            }
        }

        let mut types = self.write_types();
        let mut names: Vec<String> = Vec::new();
        for (name, ty) in found {
            types.entry(name.clone()).or_insert(ty);
            names.push(name);
        }
        for name in types.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        Ok(names)
    }

    fn gate_filename(ty: RepoType, filename: &str) -> Result<()> {
        if filename.is_empty()
            || filename.starts_with('/')
            || filename.contains('\\')
            || filename
                .split('/')
                .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(Error::InvalidInput(format!(
                "invalid package filename {:?}",
                filename
            )));
        }
        if let Some(ext) = ty.package_extension() {
            // Extensions match case-insensitively, like the listing filter.
            if !filename.to_ascii_lowercase().ends_with(ext) {
                return Err(Error::InvalidFileType(format!(
                    "{} repositories accept only {} files, got {}",
                    ty, ext, filename
                )));
            }
            if filename.contains('/') {
                return Err(Error::InvalidInput(format!(
                    "{} package filenames cannot contain directories",
                    ty
                )));
            }
        }
        Ok(())
    }

    pub fn upload_package(
        &self,
        name: &str,
        filename: &str,
        reader: &mut dyn Read,
        auto_refresh: bool,
    ) -> Result<()> {
        let ty = self.resolve(name)?;
        Self::gate_filename(ty, filename)?;
        let repo = self.repo(ty)?;
        let _guard = self.write_types();
        repo.upload_package(name, filename, reader)?;
        if auto_refresh {
            repo.refresh_metadata(name)?;
        }
        Ok(())
    }

    /// Upload several packages in one shot. Per-file failures land in
    /// the outcome; metadata is refreshed once at the end if anything
    /// succeeded.
    pub fn upload_batch(
        &self,
        name: &str,
        files: Vec<(String, Vec<u8>)>,
        auto_refresh: bool,
    ) -> Result<BatchOutcome> {
        let ty = self.resolve(name)?;
        let repo = self.repo(ty)?;
        let _guard = self.write_types();

        let mut results = Vec::with_capacity(files.len());
        for (filename, data) in files {
            let stored = Self::gate_filename(ty, &filename).and_then(|_| {
                repo.upload_package(name, &filename, &mut data.as_slice())
            });
            results.push(match stored {
                Ok(()) => BatchFileResult {
                    filename,
                    status: BatchFileStatus::Success,
                    error: None,
                },
                Err(e) => BatchFileResult {
                    filename,
                    status: BatchFileStatus::Failed,
                    error: Some(e.to_string()),
                },
            });
        }

        let outcome = BatchOutcome::from_results(results);
        if auto_refresh && outcome.success > 0 {
            repo.refresh_metadata(name)?;
        }
        Ok(outcome)
    }

    pub fn download_package(
        &self,
        name: &str,
        filename: &str,
    ) -> Result<Box<dyn Read + Send>> {
        let ty = self.resolve(name)?;
        self.repo(ty)?.download_package(name, filename)
    }

    pub fn delete_package(&self, name: &str, filename: &str) -> Result<()> {
        let ty = self.resolve(name)?;
        let repo = self.repo(ty)?;
        let _guard = self.write_types();
        repo.delete_package(name, filename)
    }

    pub fn list_packages(&self, name: &str) -> Result<Vec<PackageInfo>> {
        let ty = self.resolve(name)?;
        self.repo(ty)?.list_packages(name)
    }

    pub fn refresh_metadata(&self, name: &str) -> Result<()> {
        let ty = self.resolve(name)?;
        let repo = self.repo(ty)?;
        let _guard = self.write_types();
        repo.refresh_metadata(name)
    }

    pub fn get_metadata(&self, name: &str) -> Result<Vec<FileInfo>> {
        let ty = self.resolve(name)?;
        self.repo(ty)?.get_metadata(name)
    }

    pub fn open_metadata(&self, name: &str, path: &str) -> Result<Box<dyn Read + Send>> {
        let ty = self.resolve(name)?;
        self.repo(ty)?.open_metadata(name, path)
    }

    pub fn package_checksum(&self, name: &str, filename: &str) -> Result<String> {
        let ty = self.resolve(name)?;
        self.repo(ty)?.package_checksum(name, filename)
    }

    pub fn repo_info(&self, name: &str) -> Result<RepoInfo> {
        let ty = self.resolve(name)?;
        let packages = self.repo(ty)?.list_packages(name)?;
        Ok(RepoInfo {
            name: name.to_string(),
            repo_type: ty.to_string(),
            package_count: packages.len(),
            rpm_count: packages.iter().filter(|p| p.name.ends_with(".rpm")).count(),
            deb_count: packages.iter().filter(|p| p.name.ends_with(".deb")).count(),
            total_size: packages.iter().map(|p| p.size).sum(),
            packages,
        })
    }

    /// Storage location string for a path inside a repository.
    pub fn location(&self, name: &str, path: &str) -> Result<String> {
        let ty = self.resolve(name)?;
        Ok(self.repo(ty)?.location(name, path))
    }
}
