// src/repo/rpm.rs

//! Yum/RPM repository type
//!
//! Packages land under `<repo>/Packages/` and metadata generation is
//! delegated to `createrepo_c`, which writes `<repo>/repodata/`. The
//! generator works on a filesystem path, so this type is only wired to
//! filesystem-backed storage.

use crate::error::{Error, Result};
use crate::repo::{generator, primary, repo_dirs, Repo, RepoType, REPO_TYPE_MARKER};
use crate::storage::{FileInfo, ListOptions, Storage};
use crate::types::PackageInfo;
use std::io::Read;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

const CREATEREPO_BIN: &str = "createrepo_c";
const CREATEREPO_TIMEOUT: Duration = Duration::from_secs(300);
/// Old metadata generations stay downloadable for clients holding a
/// stale repomd.xml.
const RETAIN_OLD_MD_AGE: &str = "24h";

pub struct RpmRepo {
    storage: Box<dyn Storage>,
}

pub fn construct(storage: Box<dyn Storage>) -> Box<dyn Repo> {
    Box::new(RpmRepo { storage })
}

impl RpmRepo {
    fn packages_dir(name: &str) -> String {
        format!("{}/Packages", name)
    }

    fn package_path(name: &str, filename: &str) -> String {
        format!("{}/Packages/{}", name, filename)
    }

    fn repodata_dir(name: &str) -> String {
        format!("{}/repodata", name)
    }
}

impl Repo for RpmRepo {
    fn kind(&self) -> RepoType {
        RepoType::Rpm
    }

    fn create_repo(&self, name: &str) -> Result<()> {
        self.storage.create_dir(&Self::packages_dir(name))
    }

    fn delete_repo(&self, name: &str) -> Result<()> {
        self.storage.delete(name)
    }

    fn repo_exists(&self, name: &str) -> Result<bool> {
        if self.storage.exists(&format!("{}/repodata/repomd.xml", name))? {
            return Ok(true);
        }
        self.storage.exists(&Self::packages_dir(name))
    }

    fn list_repos(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir in repo_dirs(self.storage.as_ref())? {
            if !dir.is_dir {
                continue;
            }
            // Directories claimed by an explicit type marker belong to
            // the files type, whatever else they contain.
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
        // The service gates too; this layer rejects on its own so a repo
        // handle used directly cannot plant foreign files.
        if !filename.to_ascii_lowercase().ends_with(".rpm") {
            return Err(Error::InvalidFileType(format!(
                "rpm repositories accept only .rpm files, got {}",
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
            &Self::packages_dir(name),
            &ListOptions::unlimited().with_extensions(&[".rpm"]),
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
        info!(repo = name, dir = %repo_dir, "running {}", CREATEREPO_BIN);

        let mut cmd = Command::new(CREATEREPO_BIN);
        cmd.arg("--update")
            .arg("--compress-type")
            .arg("gz")
            .arg("--retain-old-md-by-age")
            .arg(RETAIN_OLD_MD_AGE)
            .arg(&repo_dir);
        let output = generator::run(cmd, CREATEREPO_TIMEOUT)?;

        if !output.status.success() {
            return Err(Error::Generator(format!(
                "{} exited with {}: {}",
                CREATEREPO_BIN,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(repo = name, "metadata refreshed");
        Ok(())
    }

    fn get_metadata(&self, name: &str) -> Result<Vec<FileInfo>> {
        self.storage
            .list_with_options(&Self::repodata_dir(name), &ListOptions::unlimited())
    }

    fn open_metadata(&self, name: &str, path: &str) -> Result<Box<dyn Read + Send>> {
        if !path.starts_with("repodata/") || path.contains("..") {
            return Err(Error::InvalidInput(format!(
                "{} is not an rpm metadata path",
                path
            )));
        }
        self.storage.get(&format!("{}/{}", name, path))
    }

    fn package_checksum(&self, name: &str, filename: &str) -> Result<String> {
        let repodata = self.get_metadata(name)?;
        let newest = primary::find_newest_primary(&repodata).ok_or_else(|| {
            Error::NotFound(format!("no primary metadata in repository {}", name))
        })?;
        let reader = self
            .storage
            .get(&format!("{}/{}", Self::repodata_dir(name), newest.name))?;
        let metadata = primary::parse_primary(reader)?;
        match metadata.checksum_for(filename) {
            Some(cs) => Ok(cs.value.clone()),
            None => Err(Error::NotFound(format!(
                "package {} not in metadata of {}",
                filename, name
            ))),
        }
    }

    fn location(&self, name: &str, path: &str) -> String {
        self.storage.location(&format!("{}/{}", name, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn repo_over_tempdir() -> (TempDir, Box<dyn Repo>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = local::construct(dir.path()).unwrap();
        (dir, construct(storage))
    }

    fn upload(repo: &dyn Repo, name: &str, filename: &str, data: &[u8]) {
        repo.upload_package(name, filename, &mut Cursor::new(data.to_vec()))
            .unwrap();
    }

    #[test]
    fn test_package_round_trip() {
        let (_dir, repo) = repo_over_tempdir();
        repo.create_repo("el9").unwrap();
        upload(repo.as_ref(), "el9", "tool-1.0-1.x86_64.rpm", b"rpmbytes");

        let mut out = Vec::new();
        repo.download_package("el9", "tool-1.0-1.x86_64.rpm")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"rpmbytes");

        let packages = repo.list_packages("el9").unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "tool-1.0-1.x86_64.rpm");
        assert_eq!(packages[0].size, 8);

        repo.delete_package("el9", "tool-1.0-1.x86_64.rpm").unwrap();
        assert!(repo.list_packages("el9").unwrap().is_empty());
    }

    #[test]
    fn test_list_packages_ignores_non_rpm() {
        let (dir, repo) = repo_over_tempdir();
        repo.create_repo("el9").unwrap();
        upload(repo.as_ref(), "el9", "a.rpm", b"1");
        // A stray file dropped on disk outside the upload path.
        std::fs::write(dir.path().join("el9/Packages/stray.txt"), b"2").unwrap();
        let names: Vec<_> = repo
            .list_packages("el9")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a.rpm"]);
    }

    #[test]
    fn test_upload_rejects_wrong_extension() {
        let (dir, repo) = repo_over_tempdir();
        repo.create_repo("el9").unwrap();
        let err = repo
            .upload_package("el9", "evil.txt", &mut Cursor::new(b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFileType(_)));
        assert!(!dir.path().join("el9/Packages/evil.txt").exists());
        // Case only differs; still an rpm.
        upload(repo.as_ref(), "el9", "TOOL-1.0-1.X86_64.RPM", b"r");
    }

    #[test]
    fn test_repo_lifecycle() {
        let (_dir, repo) = repo_over_tempdir();
        assert!(!repo.repo_exists("el9").unwrap());
        repo.create_repo("el9").unwrap();
        assert!(repo.repo_exists("el9").unwrap());
        // Creating twice is a no-op.
        repo.create_repo("el9").unwrap();

        repo.delete_repo("el9").unwrap();
        assert!(!repo.repo_exists("el9").unwrap());
        repo.delete_repo("el9").unwrap();
    }

    #[test]
    fn test_list_repos_skips_marked_dirs() {
        let (dir, repo) = repo_over_tempdir();
        repo.create_repo("real").unwrap();

        // A files repository that happens to contain a Packages dir.
        std::fs::create_dir_all(dir.path().join("marked/Packages")).unwrap();
        std::fs::write(dir.path().join("marked").join(REPO_TYPE_MARKER), b"files").unwrap();

        // A plain directory with no repository shape.
        std::fs::create_dir_all(dir.path().join("junk/sub")).unwrap();

        assert_eq!(repo.list_repos().unwrap(), vec!["real"]);
    }

    #[test]
    fn test_checksum_from_primary_metadata() {
        let (dir, repo) = repo_over_tempdir();
        repo.create_repo("el9").unwrap();
        upload(repo.as_ref(), "el9", "alpha-1.0-1.x86_64.rpm", b"pkg");

        let xml = r#"<?xml version="1.0"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" packages="1">
  <package type="rpm">
    <name>alpha</name>
    <checksum type="sha256" pkgid="YES">deadbeefcafe</checksum>
    <location href="Packages/alpha-1.0-1.x86_64.rpm"/>
  </package>
</metadata>"#;
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(xml.as_bytes()).unwrap();
        let gz = enc.finish().unwrap();
        let repodata = dir.path().join("el9/repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(repodata.join("f00-primary.xml.gz"), &gz).unwrap();
        std::fs::write(repodata.join("repomd.xml"), b"<repomd/>").unwrap();

        assert_eq!(
            repo.package_checksum("el9", "alpha-1.0-1.x86_64.rpm").unwrap(),
            "deadbeefcafe"
        );
        assert!(repo
            .package_checksum("el9", "missing.rpm")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_checksum_without_metadata_is_not_found() {
        let (_dir, repo) = repo_over_tempdir();
        repo.create_repo("el9").unwrap();
        assert!(repo
            .package_checksum("el9", "a.rpm")
            .unwrap_err()
            .is_not_found());
    }
}
