// src/name.rs

//! Repository name validation and parsing
//!
//! A repository name is a path: one or more `/`-separated segments, e.g.
//! `centos/7/x86_64`. Names double as storage-relative directories, so the
//! rules are strict:
//!
//! - total length 1..=256
//! - no leading, trailing, or doubled `/`
//! - every segment is 1..=50 chars of `[A-Za-z0-9_-]`
//!
//! `RepoName` is the validated form; anything that crosses from the HTTP
//! edge into the service goes through [`RepoName::parse`] first.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_NAME_LEN: usize = 256;
const MAX_SEGMENT_LEN: usize = 50;

/// A validated, possibly multi-segment repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName(String);

/// Errors produced by repository name validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,

    #[error("name exceeds {MAX_NAME_LEN} characters")]
    TooLong,

    #[error("name must not start or end with '/': {0}")]
    EdgeSeparator(String),

    #[error("name contains '//': {0}")]
    DoubledSeparator(String),

    #[error("segment '{0}' is empty or exceeds {MAX_SEGMENT_LEN} characters")]
    BadSegmentLength(String),

    #[error("segment '{0}' contains characters outside [A-Za-z0-9_-]")]
    BadSegmentChars(String),
}

impl RepoName {
    /// Validate a repository name.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        if s.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        if s.starts_with('/') || s.ends_with('/') {
            return Err(NameError::EdgeSeparator(s.to_string()));
        }
        if s.contains("//") {
            return Err(NameError::DoubledSeparator(s.to_string()));
        }

        for segment in s.split('/') {
            if segment.is_empty() || segment.len() > MAX_SEGMENT_LEN {
                return Err(NameError::BadSegmentLength(segment.to_string()));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(NameError::BadSegmentChars(segment.to_string()));
            }
        }

        Ok(Self(s.to_string()))
    }

    /// Check validity without constructing.
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `/`-separated segments of the name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
