// src/repo/files.rs

//! Generic file repository type
//!
//! No format conventions and no generated metadata: any artifact under
//! any nested path. The only structure is the `.repo-type` marker at the
//! repository root, which is what type inference keys on, since nothing
//! else distinguishes a files repository from a plain directory.

use crate::error::{Error, Result};
use crate::repo::{repo_dirs, Repo, RepoType, REPO_TYPE_MARKER};
use crate::storage::{FileInfo, ListOptions, Storage};
use crate::types::PackageInfo;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};

pub struct FilesRepo {
    storage: Box<dyn Storage>,
}

pub fn construct(storage: Box<dyn Storage>) -> Box<dyn Repo> {
    Box::new(FilesRepo { storage })
}

impl FilesRepo {
    fn marker_path(name: &str) -> String {
        format!("{}/{}", name, REPO_TYPE_MARKER)
    }

    fn artifact_path(name: &str, filename: &str) -> Result<String> {
        if filename == REPO_TYPE_MARKER {
            return Err(Error::InvalidInput(format!(
                "{} is reserved",
                REPO_TYPE_MARKER
            )));
        }
        Ok(format!("{}/{}", name, filename))
    }
}

impl Repo for FilesRepo {
    fn kind(&self) -> RepoType {
        RepoType::Files
    }

    fn create_repo(&self, name: &str) -> Result<()> {
        self.storage.create_dir(name)?;
        let mut marker = Cursor::new(RepoType::Files.as_str().as_bytes().to_vec());
        self.storage.store(&Self::marker_path(name), &mut marker)
    }

    fn delete_repo(&self, name: &str) -> Result<()> {
        self.storage.delete(name)
    }

    fn repo_exists(&self, name: &str) -> Result<bool> {
        self.storage.exists(&Self::marker_path(name))
    }

    fn list_repos(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir in repo_dirs(self.storage.as_ref())? {
            if dir.is_dir && self.repo_exists(&dir.name)? {
                names.push(dir.name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn upload_package(&self, name: &str, filename: &str, reader: &mut dyn Read) -> Result<()> {
        self.storage.store(&Self::artifact_path(name, filename)?, reader)
    }

    fn download_package(&self, name: &str, filename: &str) -> Result<Box<dyn Read + Send>> {
        self.storage.get(&Self::artifact_path(name, filename)?)
    }

    fn delete_package(&self, name: &str, filename: &str) -> Result<()> {
        self.storage.delete(&Self::artifact_path(name, filename)?)
    }

    fn list_packages(&self, name: &str) -> Result<Vec<PackageInfo>> {
        let files = self
            .storage
            .list_with_options(name, &ListOptions::unlimited())?;
        Ok(files
            .into_iter()
            .filter(|f| !f.is_dir && f.name != REPO_TYPE_MARKER)
            .map(|f| PackageInfo {
                name: f.name,
                size: f.size,
                checksum: None,
                modified: Some(f.modified),
            })
            .collect())
    }

    /// Nothing to generate.
    fn refresh_metadata(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn get_metadata(&self, _name: &str) -> Result<Vec<FileInfo>> {
        Err(Error::Unsupported(
            "files repositories have no metadata".to_string(),
        ))
    }

    fn open_metadata(&self, _name: &str, _path: &str) -> Result<Box<dyn Read + Send>> {
        Err(Error::Unsupported(
            "files repositories have no metadata".to_string(),
        ))
    }

    /// Computed live from the stored bytes; there is no metadata to
    /// read it from.
    fn package_checksum(&self, name: &str, filename: &str) -> Result<String> {
        let mut reader = self.download_package(name, filename)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| Error::io(format!("hash {}/{}", name, filename), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn location(&self, name: &str, path: &str) -> String {
        self.storage.location(&format!("{}/{}", name, path))
    }
}
