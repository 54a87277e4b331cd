// src/storage/local.rs

//! Local filesystem storage backend
//!
//! Paths are resolved under a fixed base directory. Symlinks are only
//! honored while their resolved target stays inside the base; a link that
//! escapes the base or whose target is gone behaves as if the path did not
//! exist. This is the path-traversal guard for direct file serving.

use crate::error::{Error, Result};
use crate::storage::{FileInfo, ListOptions, Storage};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub struct LocalStorage {
    base: PathBuf,
    /// Canonicalized base, the containment boundary for symlink targets.
    canonical_base: PathBuf,
}

/// Registry constructor.
pub fn construct(base: &Path) -> Result<Box<dyn Storage>> {
    Ok(Box::new(LocalStorage::new(base)?))
}

impl LocalStorage {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)
            .map_err(|e| Error::io(format!("create storage root {}", base.display()), e))?;
        let canonical_base = base
            .canonicalize()
            .map_err(|e| Error::io(format!("resolve storage root {}", base.display()), e))?;
        Ok(Self {
            base,
            canonical_base,
        })
    }

    /// Join a storage-relative path onto the base, refusing traversal
    /// components outright.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "path escapes storage root: {}",
                        path
                    )));
                }
            }
        }
        Ok(self.base.join(relative))
    }

    /// Resolve symlinks in `full` and verify the target stays inside the
    /// storage root. Dangling links and escaping links yield `None`.
    fn contained_target(&self, full: &Path) -> Option<PathBuf> {
        let canonical = full.canonicalize().ok()?;
        if canonical.starts_with(&self.canonical_base) {
            Some(canonical)
        } else {
            warn!(path = %full.display(), "symlink escapes storage root, refusing to follow");
            None
        }
    }

    /// Repo-marker heuristic, cheapest check first: a known file beats
    /// directory enumeration beats glob-matching package files.
    fn is_repo_dir(dir: &Path) -> bool {
        if dir.join("repodata/repomd.xml").is_file() {
            return true;
        }
        if dir.join("repodata").is_dir() {
            return true;
        }
        if let Ok(entries) = fs::read_dir(dir.join("Packages")) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().to_lowercase().ends_with(".rpm")
                    && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                {
                    return true;
                }
            }
        }
        false
    }
}

impl Storage for LocalStorage {
    fn store(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("create parent of {}", path), e))?;
        }
        // A pre-planted symlink would be followed by File::create,
        // truncating whatever it points at; only links staying inside the
        // root may be written through.
        if let Ok(meta) = fs::symlink_metadata(&full) {
            if meta.file_type().is_symlink() && self.contained_target(&full).is_none() {
                return Err(Error::InvalidInput(format!(
                    "path escapes storage root: {}",
                    path
                )));
            }
        }
        let mut file =
            fs::File::create(&full).map_err(|e| Error::io(format!("store {}", path), e))?;
        std::io::copy(reader, &mut file).map_err(|e| Error::io(format!("store {}", path), e))?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path)?;
        // Two passes: if the symlink target moves between resolution and
        // open, resolve once more before reporting NotFound.
        for _ in 0..2 {
            let Some(target) = self.contained_target(&full) else {
                break;
            };
            match fs::File::open(&target) {
                Ok(file) => return Ok(Box::new(file)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(format!("get {}", path), e)),
            }
        }
        Err(Error::NotFound(format!("file {}", path)))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            // Idempotent: deleting the absent is success.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(format!("delete {}", path), e)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!("delete {}", path), e)),
        }
    }

    fn list_with_options(&self, prefix: &str, opts: &ListOptions) -> Result<Vec<FileInfo>> {
        let full = self.resolve(prefix)?;
        if !full.exists() {
            return Ok(Vec::new());
        }

        // max_depth counts separators in the relative path; walkdir depth
        // is segments, hence the +1.
        let mut walker = WalkDir::new(&full).min_depth(1).follow_links(false);
        if opts.max_depth >= 0 {
            walker = walker.max_depth(opts.max_depth as usize + 1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(prefix, error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(&full) {
                Ok(rel) => rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"),
                Err(_) => continue,
            };

            // Symlinks are only reported when their target stays inside
            // the root; dangling and escaping links are invisible.
            let meta = if entry.path_is_symlink() {
                match self.contained_target(entry.path()) {
                    Some(target) => match fs::metadata(&target) {
                        Ok(meta) => meta,
                        Err(_) => continue,
                    },
                    None => continue,
                }
            } else {
                match entry.metadata() {
                    Ok(meta) => meta,
                    Err(_) => continue,
                }
            };

            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            if meta.is_dir() {
                if opts.include_dirs {
                    files.push(FileInfo {
                        name: relative,
                        size: meta.len(),
                        is_dir: true,
                        is_repo: Self::is_repo_dir(entry.path()),
                        modified,
                    });
                }
            } else {
                if !opts.extension_allows(&relative) {
                    continue;
                }
                files.push(FileInfo {
                    name: relative,
                    size: meta.len(),
                    is_dir: false,
                    is_repo: false,
                    modified,
                });
            }
        }

        Ok(files)
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).map_err(|e| Error::io(format!("create dir {}", path), e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        if fs::symlink_metadata(&full).is_err() {
            return Ok(false);
        }
        // Present but dangling or escaping symlinks report as absent.
        Ok(self.contained_target(&full).is_some())
    }

    fn location(&self, path: &str) -> String {
        self.base.join(path.trim_start_matches('/')).display().to_string()
    }
}
