// src/storage/mod.rs

//! Storage capability interface and backend registry
//!
//! A [`Storage`] is a byte-oriented put/get/list/delete capability over a
//! path-or-key namespace. Two backends ship: a local-filesystem
//! implementation ([`local::LocalStorage`]) and an embedded object-store
//! implementation ([`object::ObjectStorage`]). Repository implementations
//! never know which backend they run on.
//!
//! Backends are selected through a [`StorageRegistry`]: each constructor is
//! registered under a [`StorageKind`] together with free-form labels
//! ("rpm", "deb", "files"). Repository types resolve their backend by
//! label, so two repo types can share one physical backend while a third
//! uses a different one.

pub mod local;
pub mod object;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

pub use local::LocalStorage;
pub use object::ObjectStorage;

/// Entry returned by [`Storage::list_with_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path relative to the listing prefix.
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    /// True if this directory matches a repository-marker heuristic.
    pub is_repo: bool,
    pub modified: DateTime<Utc>,
}

/// Filters for [`Storage::list_with_options`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum number of separators allowed in a returned relative path;
    /// -1 means unlimited depth.
    pub max_depth: i32,
    pub include_dirs: bool,
    /// Extension filter applied to files only; never filters directories.
    pub extensions: Vec<String>,
}

impl ListOptions {
    pub fn unlimited() -> Self {
        Self {
            max_depth: -1,
            include_dirs: false,
            extensions: Vec::new(),
        }
    }

    pub fn with_dirs(mut self) -> Self {
        self.include_dirs = true;
        self
    }

    pub fn with_max_depth(mut self, depth: i32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_extensions(mut self, exts: &[&str]) -> Self {
        self.extensions = exts.iter().map(|e| e.to_string()).collect();
        self
    }

    /// True when a relative path passes the depth filter.
    pub(crate) fn depth_allows(&self, relative: &str) -> bool {
        self.max_depth < 0 || relative.matches('/').count() <= self.max_depth as usize
    }

    /// True when a filename passes the extension filter (files only).
    pub(crate) fn extension_allows(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let lower = name.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

/// Byte-oriented storage capability. All paths are storage-relative,
/// `/`-separated.
pub trait Storage: Send + Sync {
    /// Write the reader's content at `path`, creating parents as needed and
    /// overwriting existing content.
    fn store(&self, path: &str, reader: &mut dyn Read) -> Result<()>;

    /// Open `path` for reading. Absent paths and dangling symlinks are
    /// `NotFound`, not hard errors.
    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Recursively remove `path`. Deleting a non-existent path succeeds.
    fn delete(&self, path: &str) -> Result<()>;

    /// List entries under `prefix`, applying depth, directory, and
    /// extension filters.
    fn list_with_options(&self, prefix: &str, opts: &ListOptions) -> Result<Vec<FileInfo>>;

    /// Idempotently create a directory, including parents.
    fn create_dir(&self, path: &str) -> Result<()>;

    /// Whether `path` exists. A symlink with an absent target is `false`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Backend-specific addressable form of `path`, for diagnostics and
    /// tools that need a real location. Never parsed by callers.
    fn location(&self, path: &str) -> String;
}

/// Storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Local,
    Object,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Object => "object",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "object" => Ok(StorageKind::Object),
            other => Err(Error::UnsupportedStorage(other.to_string())),
        }
    }
}

type StorageCtor = fn(&Path) -> Result<Box<dyn Storage>>;

struct Registration {
    kind: StorageKind,
    ctor: StorageCtor,
    labels: Vec<String>,
}

/// Registry of storage constructors, built once at startup and handed to
/// whatever wires repositories together. Tests build their own.
pub struct StorageRegistry {
    registrations: Vec<Registration>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Registry with both built-in backends under their conventional
    /// labels: local storage backs "rpm" and "deb", the object store backs
    /// "files".
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StorageKind::Local, local::construct, &["rpm", "deb"]);
        registry.register(StorageKind::Object, object::construct, &["files"]);
        registry
    }

    /// Register a constructor under a kind with its labels. The first
    /// registration for a kind wins; duplicates are a silent no-op so
    /// independently-initialized backends need no ordering.
    pub fn register(&mut self, kind: StorageKind, ctor: StorageCtor, labels: &[&str]) {
        if self.registrations.iter().any(|r| r.kind == kind) {
            return;
        }
        self.registrations.push(Registration {
            kind,
            ctor,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        });
    }

    /// Construct a backend by exact kind.
    pub fn create(&self, kind: StorageKind, base: &Path) -> Result<Box<dyn Storage>> {
        let reg = self
            .registrations
            .iter()
            .find(|r| r.kind == kind)
            .ok_or_else(|| Error::UnsupportedStorage(kind.to_string()))?;
        (reg.ctor)(base)
    }

    /// Construct a backend by label match. Unknown labels fall back to the
    /// local kind so the system degrades gracefully instead of refusing to
    /// serve when a specialized backend is not wired in.
    pub fn create_by_label(&self, base: &Path, label: &str) -> Result<Box<dyn Storage>> {
        for reg in &self.registrations {
            if reg.labels.iter().any(|l| l == label) {
                return (reg.ctor)(base);
            }
        }
        tracing::warn!(label, "no storage registered for label, falling back to local");
        self.create(StorageKind::Local, base)
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
