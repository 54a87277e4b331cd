// src/lib.rs

//! depot - package repository server
//!
//! Stores RPM, DEB, and arbitrary file artifacts in named repositories
//! and derives the format metadata package-manager clients consume
//! (yum repodata, apt Packages indexes).
//!
//! # Architecture
//!
//! - Storage backends (local filesystem, embedded object store) behind
//!   one capability trait, selected per repository type by label
//! - One repo instance per type (rpm/deb/files), each owning its
//!   storage handle
//! - A dispatch service with a name-to-type memo; types are inferred
//!   from on-disk structure when not explicitly recorded
//! - The filesystem/object store is the source of truth: no catalog
//!   database

pub mod config;
mod error;
pub mod name;
pub mod repo;
pub mod resolver;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use name::{NameError, RepoName};
pub use repo::{Repo, RepoRegistry, RepoType};
pub use service::RepoService;
pub use storage::{Storage, StorageKind, StorageRegistry};
