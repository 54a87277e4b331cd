// src/repo/deb.rs

//! Apt/DEB repository type
//!
//! A flat repository: `.deb` files sit in the repository root next to a
//! gzipped `Packages.gz` index. The index is produced by
//! `dpkg-scanpackages` and compressed in-process, so only the scanner
//! itself is an external dependency.

use crate::error::{Error, Result};
use crate::repo::{generator, repo_dirs, Repo, RepoType, REPO_TYPE_MARKER};
use crate::storage::{FileInfo, ListOptions, Storage};
use crate::types::PackageInfo;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Read, Write};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

const SCANPACKAGES_BIN: &str = "dpkg-scanpackages";
const SCANPACKAGES_TIMEOUT: Duration = Duration::from_secs(300);
const PACKAGES_INDEX: &str = "Packages.gz";

pub struct DebRepo {
    storage: Box<dyn Storage>,
}

pub fn construct(storage: Box<dyn Storage>) -> Box<dyn Repo> {
    Box::new(DebRepo { storage })
}

impl DebRepo {
    fn package_path(name: &str, filename: &str) -> String {
        format!("{}/{}", name, filename)
    }

    fn index_path(name: &str) -> String {
        format!("{}/{}", name, PACKAGES_INDEX)
    }

    fn gzip(data: &[u8]) -> Result<Vec<u8>> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data)
            .and_then(|_| enc.finish())
            .map_err(|e| Error::io("compress Packages index", e))
    }

    fn store_index(&self, name: &str, contents: &[u8]) -> Result<()> {
        let gz = Self::gzip(contents)?;
        self.storage
            .store(&Self::index_path(name), &mut Cursor::new(gz))
    }
}

impl Repo for DebRepo {
    fn kind(&self) -> RepoType {
        RepoType::Deb
    }

    fn create_repo(&self, name: &str) -> Result<()> {
        self.storage.create_dir(name)?;
        // An empty index makes a fresh repository structurally
        // recognizable before the first upload.
        if !self.storage.exists(&Self::index_path(name))? {
            self.store_index(name, b"")?;
        }
        Ok(())
    }

    fn delete_repo(&self, name: &str) -> Result<()> {
        self.storage.delete(name)
    }

    fn repo_exists(&self, name: &str) -> Result<bool> {
        for marker in [PACKAGES_INDEX, "Packages", "Release"] {
            if self.storage.exists(&format!("{}/{}", name, marker))? {
                return Ok(true);
            }
        }
        let debs = self.storage.list_with_options(
            name,
            &ListOptions::unlimited()
                .with_max_depth(0)
                .with_extensions(&[".deb"]),
        )?;
        Ok(!debs.is_empty())
    }

    fn list_repos(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir in repo_dirs(self.storage.as_ref())? {
            if !dir.is_dir {
                continue;
            }
            if self
                .storage
                .exists(&format!("{}/{}", dir.name, REPO_TYPE_MARKER))?
            {
                continue;
            }
            if self.repo_exists(&dir.name)? {
                names.push(dir.name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn upload_package(&self, name: &str, filename: &str, reader: &mut dyn Read) -> Result<()> {
        if !filename.to_ascii_lowercase().ends_with(".deb") {
            return Err(Error::InvalidFileType(format!(
                "deb repositories accept only .deb files, got {}",
                filename
            )));
        }
        self.storage
            .store(&Self::package_path(name, filename), reader)
    }

    fn download_package(&self, name: &str, filename: &str) -> Result<Box<dyn Read + Send>> {
        self.storage.get(&Self::package_path(name, filename))
    }

    fn delete_package(&self, name: &str, filename: &str) -> Result<()> {
        self.storage.delete(&Self::package_path(name, filename))
    }

    fn list_packages(&self, name: &str) -> Result<Vec<PackageInfo>> {
        let files = self.storage.list_with_options(
            name,
            &ListOptions::unlimited().with_extensions(&[".deb"]),
        )?;
        Ok(files
            .into_iter()
            .map(|f| PackageInfo {
                name: f.name,
                size: f.size,
                checksum: None,
                modified: Some(f.modified),
            })
            .collect())
    }

    fn refresh_metadata(&self, name: &str) -> Result<()> {
        let repo_dir = self.storage.location(name);
        info!(repo = name, dir = %repo_dir, "running {}", SCANPACKAGES_BIN);

        let mut cmd = Command::new(SCANPACKAGES_BIN);
        cmd.arg(".").arg("/dev/null").current_dir(&repo_dir);
        let output = generator::run(cmd, SCANPACKAGES_TIMEOUT)?;

        if !output.status.success() {
            return Err(Error::Generator(format!(
                "{} exited with {}: {}",
                SCANPACKAGES_BIN,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        self.store_index(name, &output.stdout)?;
        debug!(repo = name, bytes = output.stdout.len(), "index regenerated");
        Ok(())
    }

    fn get_metadata(&self, name: &str) -> Result<Vec<FileInfo>> {
        let files = self.storage.list_with_options(
            name,
            &ListOptions::unlimited().with_max_depth(0),
        )?;
        Ok(files
            .into_iter()
            .filter(|f| f.name == PACKAGES_INDEX)
            .collect())
    }

    fn open_metadata(&self, name: &str, path: &str) -> Result<Box<dyn Read + Send>> {
        if !matches!(path, "Packages" | "Packages.gz" | "Release") {
            return Err(Error::InvalidInput(format!(
                "{} is not an apt metadata path",
                path
            )));
        }
        self.storage.get(&format!("{}/{}", name, path))
    }

    /// The index carries per-package checksums but there is no lookup
    /// into it yet; callers get an empty string rather than an error.
    fn package_checksum(&self, _name: &str, _filename: &str) -> Result<String> {
        Ok(String::new())
    }

    fn location(&self, name: &str, path: &str) -> String {
        self.storage.location(&format!("{}/{}", name, path))
    }
}
