// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
#![allow(dead_code)]

use axum::Router;
use depot::server::{create_router, ServerConfig, ServerState};
use depot::RepoService;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh service over a temp storage root.
///
/// Returns (TempDir, service) - keep the TempDir alive to prevent cleanup.
pub fn setup_service() -> (TempDir, RepoService) {
    let temp_dir = tempfile::tempdir().unwrap();
    let service = RepoService::from_defaults(temp_dir.path()).unwrap();
    (temp_dir, service)
}

/// Fresh router over a temp storage root, auth disabled.
pub fn setup_router() -> (TempDir, Router) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        storage_root: temp_dir.path().to_path_buf(),
        auth_token: None,
        auto_refresh: false,
        ..ServerConfig::default()
    };
    let service = RepoService::from_defaults(temp_dir.path()).unwrap();
    let state = Arc::new(ServerState::new(service, config));
    (temp_dir, create_router(state))
}

pub const BOUNDARY: &str = "X-DEPOT-TEST-BOUNDARY";

/// Build a multipart/form-data body with the given file parts and an
/// optional auto_refresh value.
pub fn multipart_body(files: &[(&str, &str, &[u8])], auto_refresh: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(value) = auto_refresh {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"auto_refresh\"\r\n\r\n{}\r\n",
                BOUNDARY, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
