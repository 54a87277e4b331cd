// src/storage/object.rs

//! Embedded object-store storage backend
//!
//! Objects live in a single SQLite table keyed by `/`-joined strings.
//! Directories do not exist natively: they are zero-byte marker objects
//! whose key ends in `/`. Listing synthesizes directory entries for any
//! intermediate segment implied by a deeper object key, because files can
//! be uploaded straight to a deep key without markers ever being created
//! for the segments above it.

use crate::error::{Error, Result};
use crate::storage::{FileInfo, ListOptions, Storage};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const BUCKET: &str = "depot";

pub struct ObjectStorage {
    conn: Mutex<Connection>,
}

/// Registry constructor.
pub fn construct(base: &Path) -> Result<Box<dyn Storage>> {
    Ok(Box::new(ObjectStorage::open(base)?))
}

impl ObjectStorage {
    /// Open (or create) the object database under `base`.
    pub fn open(base: &Path) -> Result<Self> {
        std::fs::create_dir_all(base)
            .map_err(|e| Error::io(format!("create object store root {}", base.display()), e))?;
        let conn = Connection::open(base.join("objects.db"))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                key      TEXT PRIMARY KEY,
                data     BLOB NOT NULL,
                size     INTEGER NOT NULL,
                modified INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                key      TEXT PRIMARY KEY,
                data     BLOB NOT NULL,
                size     INTEGER NOT NULL,
                modified INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn normalize(path: &str) -> String {
        path.trim_start_matches('/').to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a prior panic mid-query; the connection
        // itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_exists(conn: &Connection, key: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM objects WHERE key = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn prefix_exists(conn: &Connection, prefix: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM objects WHERE key LIKE ?1 ESCAPE '\\' LIMIT 1",
                params![like_pattern(prefix)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Repo heuristic for a directory key: the explicit `.repo-type`
    /// marker first, then characteristic subdirectory shapes.
    fn is_repo_key(conn: &Connection, dir_key: &str) -> Result<bool> {
        let dir = if dir_key.ends_with('/') {
            dir_key.to_string()
        } else {
            format!("{}/", dir_key)
        };
        if Self::key_exists(conn, &format!("{}.repo-type", dir))? {
            return Ok(true);
        }
        for indicator in ["Packages/", "repodata/", "dists/"] {
            if Self::prefix_exists(conn, &format!("{}{}", dir, indicator))? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn like_pattern(prefix: &str) -> String {
    // Escape LIKE metacharacters so object keys containing % or _ match
    // literally.
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{}%", escaped)
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

impl Storage for ObjectStorage {
    fn store(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let key = Self::normalize(path);
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| Error::io(format!("read upload for {}", path), e))?;
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO objects (key, data, size, modified) VALUES (?1, ?2, ?3, ?4)",
            params![key, data, data.len() as i64, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let key = Self::normalize(path);
        let conn = self.lock();
        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM objects WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => Err(Error::NotFound(format!("object {}", path))),
        }
    }

    fn delete(&self, path: &str) -> Result<()> {
        let key = Self::normalize(path);
        let conn = self.lock();
        // Remove the key itself, its directory marker, and everything
        // beneath it. Deleting the absent is success.
        let dir = format!("{}/", key.trim_end_matches('/'));
        conn.execute(
            "DELETE FROM objects WHERE key = ?1 OR key = ?2 OR key LIKE ?3 ESCAPE '\\'",
            params![key, dir, like_pattern(&dir)],
        )?;
        Ok(())
    }

    fn list_with_options(&self, prefix: &str, opts: &ListOptions) -> Result<Vec<FileInfo>> {
        let mut normalized = Self::normalize(prefix);
        if !normalized.is_empty() && !normalized.ends_with('/') {
            normalized.push('/');
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT key, size, modified FROM objects WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt.query_map(params![like_pattern(&normalized)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut files = Vec::new();
        let mut directories: BTreeMap<String, FileInfo> = BTreeMap::new();

        for row in rows {
            let (key, size, modified) = row?;
            let relative = &key[normalized.len()..];
            if relative.is_empty() {
                // The marker for the listing prefix itself.
                continue;
            }

            let is_marker = key.ends_with('/') && size == 0;
            if is_marker {
                if opts.include_dirs {
                    let dir_name = relative.trim_end_matches('/').to_string();
                    if !dir_name.is_empty() && opts.depth_allows(&dir_name) {
                        directories.insert(
                            dir_name.clone(),
                            FileInfo {
                                name: dir_name,
                                size: 0,
                                is_dir: true,
                                is_repo: Self::is_repo_key(&conn, &key)?,
                                modified: millis_to_utc(modified),
                            },
                        );
                    }
                }
                continue;
            }

            // Synthesize intermediate directories implied by a deep key,
            // whether or not markers were ever created for them.
            if opts.include_dirs {
                let segments: Vec<&str> = relative.split('/').collect();
                for i in 1..segments.len() {
                    let dir_path = segments[..i].join("/");
                    if !opts.depth_allows(&dir_path) || directories.contains_key(&dir_path) {
                        continue;
                    }
                    let dir_key = format!("{}{}/", normalized, dir_path);
                    directories.insert(
                        dir_path.clone(),
                        FileInfo {
                            name: dir_path,
                            size: 0,
                            is_dir: true,
                            is_repo: Self::is_repo_key(&conn, &dir_key)?,
                            modified: millis_to_utc(modified),
                        },
                    );
                }
            }

            if opts.depth_allows(relative) && opts.extension_allows(relative) {
                files.push(FileInfo {
                    name: relative.to_string(),
                    size: size.max(0) as u64,
                    is_dir: false,
                    is_repo: false,
                    modified: millis_to_utc(modified),
                });
            }
        }

        files.extend(directories.into_values());
        debug!(prefix, count = files.len(), "object store listing");
        Ok(files)
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        let mut key = Self::normalize(path);
        if !key.ends_with('/') {
            key.push('/');
        }
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO objects (key, data, size, modified) VALUES (?1, x'', 0, ?2)",
            params![key, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let key = Self::normalize(path);
        let conn = self.lock();
        if Self::key_exists(&conn, &key)? {
            return Ok(true);
        }
        if !key.ends_with('/') && Self::key_exists(&conn, &format!("{}/", key))? {
            return Ok(true);
        }
        // Probe as a directory prefix; a bare `key%` pattern would let a
        // sibling like `keychain/...` answer for `key`.
        if key.is_empty() {
            return Self::prefix_exists(&conn, "");
        }
        Self::prefix_exists(&conn, &format!("{}/", key.trim_end_matches('/')))
    }

    fn location(&self, path: &str) -> String {
        format!("object://{}/{}", BUCKET, Self::normalize(path))
    }
}
