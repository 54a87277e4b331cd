// src/server/handlers.rs
//! HTTP handlers for the depot surface
//!
//! The `/repo/{path}` tree is dispatched through [`crate::resolver`]
//! because repository names are multi-segment paths and axum's router
//! cannot disambiguate `a/b/upload` on its own. Everything that touches
//! the blocking repository core goes through `spawn_blocking`.

use crate::error::Error;
use crate::resolver::{self, RouteTarget};
use crate::server::ServerState;
use crate::types::{build_repo_tree, PackageChecksum, RepoList};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
struct Status {
    status: &'static str,
    message: String,
}

fn success(message: impl Into<String>) -> Response {
    Json(Status {
        status: "success",
        message: message.into(),
    })
    .into_response()
}

fn failure(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(Status {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

fn error_response(err: Error) -> Response {
    let code = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_invalid() || matches!(err, Error::Unsupported(_) | Error::UnsupportedType(_))
    {
        StatusCode::BAD_REQUEST
    } else {
        error!("request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    failure(code, err.to_string())
}

/// Bridge a blocking service call onto the blocking pool, flattening
/// the join error into a 500.
async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(error_response(err)),
        Err(join_err) => {
            error!("blocking task panicked: {}", join_err);
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
            ))
        }
    }
}

/// Pump a blocking reader into a response body chunk by chunk, so a
/// gigabyte artifact never sits in memory whole.
fn stream_blocking_reader(mut reader: Box<dyn Read + Send>) -> Body {
    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(8);
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 64 * 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    // A closed channel means the client went away.
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });
    Body::from_stream(ReceiverStream::new(rx))
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("");
    match ext {
        "rpm" => "application/x-rpm",
        "deb" => "application/vnd.debian.binary-package",
        "xml" => "application/xml",
        "gz" => "application/gzip",
        "xz" => "application/x-xz",
        "json" => "application/json",
        "txt" | "log" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

// GET /health
pub async fn health() -> Response {
    success("ok")
}

// GET /ready — verifies the storage root is writable.
pub async fn ready(State(state): State<Arc<ServerState>>) -> Response {
    let root = state.config.storage_root.clone();
    let probe = blocking(move || {
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::io(format!("create storage root {}", root.display()), e))?;
        let path = root.join(".ready-probe");
        std::fs::write(&path, b"ok").map_err(|e| Error::io("write readiness probe", e))?;
        std::fs::remove_file(&path).map_err(|e| Error::io("remove readiness probe", e))?;
        Ok(())
    })
    .await;
    match probe {
        Ok(()) => success("ready"),
        Err(_) => failure(StatusCode::SERVICE_UNAVAILABLE, "storage root not writable"),
    }
}

// GET /repos
pub async fn list_repos(State(state): State<Arc<ServerState>>) -> Response {
    let service = state.service.clone();
    match blocking(move || service.list_repos()).await {
        Ok(repos) => Json(RepoList {
            tree: build_repo_tree(&repos),
            count: repos.len(),
            repositories: repos,
        })
        .into_response(),
        Err(resp) => resp,
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRepoRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub repo_type: String,
}

// POST /repos
pub async fn create_repo(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CreateRepoRequest>,
) -> Response {
    let ty = match body.repo_type.parse() {
        Ok(ty) => ty,
        Err(err) => return error_response(err),
    };
    let service = state.service.clone();
    let name = body.name.clone();
    match blocking(move || service.create_repo(&name, ty)).await {
        Ok(()) => success(format!("Repository {} created", body.name)),
        Err(resp) => resp,
    }
}

// Entry point for everything under /repo/{path}.
pub async fn repo_dispatch(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
    method: Method,
    req: Request,
) -> Response {
    let full = format!("/repo/{}", path);
    let Some(target) = resolver::resolve(method.as_str(), &full) else {
        return failure(StatusCode::NOT_FOUND, "Not Found");
    };

    match target {
        RouteTarget::Upload { repo } => upload(state, repo, req).await,
        RouteTarget::Refresh { repo } => refresh(state, repo).await,
        RouteTarget::Checksum { repo, filename } => checksum(state, repo, filename).await,
        RouteTarget::DownloadPackage { repo, filename } => {
            download_package(state, repo, filename).await
        }
        RouteTarget::Metadata { repo, path } => serve_metadata(state, repo, path).await,
        RouteTarget::RepoFile { repo, path } => serve_repo_file(state, repo, path).await,
        RouteTarget::RepoInfo { repo } => repo_info(state, repo).await,
        RouteTarget::DeleteRepo { repo } => delete_repo(state, repo).await,
    }
}

async fn upload(state: Arc<ServerState>, repo: String, req: Request) -> Response {
    let mut multipart = match Multipart::from_request(req, &()).await {
        Ok(mp) => mp,
        Err(err) => return failure(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut auto_refresh = state.config.auto_refresh;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return failure(StatusCode::BAD_REQUEST, err.to_string()),
        };
        match field.name().unwrap_or("") {
            "file" | "files" => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    return failure(StatusCode::BAD_REQUEST, "file field without a filename");
                };
                match field.bytes().await {
                    Ok(bytes) => files.push((filename, bytes.to_vec())),
                    Err(err) => return failure(StatusCode::BAD_REQUEST, err.to_string()),
                }
            }
            "auto_refresh" => match field.text().await {
                Ok(text) => auto_refresh = text == "true",
                Err(err) => return failure(StatusCode::BAD_REQUEST, err.to_string()),
            },
            other => {
                warn!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    if files.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No file uploaded");
    }

    let service = state.service.clone();
    if files.len() == 1 {
        let (filename, data) = files.into_iter().next().unwrap();
        let repo_name = repo.clone();
        match blocking(move || {
            service.upload_package(&repo_name, &filename, &mut data.as_slice(), auto_refresh)
        })
        .await
        {
            Ok(()) => success("Package uploaded successfully"),
            Err(resp) => resp,
        }
    } else {
        let repo_name = repo.clone();
        match blocking(move || service.upload_batch(&repo_name, files, auto_refresh)).await {
            Ok(outcome) => Json(outcome).into_response(),
            Err(resp) => resp,
        }
    }
}

async fn refresh(state: Arc<ServerState>, repo: String) -> Response {
    let service = state.service.clone();
    let repo_name = repo.clone();
    let outcome = blocking(move || {
        if service.repo_type(&repo_name)? == crate::repo::RepoType::Files {
            return Err(Error::Unsupported(
                "Files repositories do not require metadata refresh".to_string(),
            ));
        }
        service.refresh_metadata(&repo_name)
    })
    .await;
    match outcome {
        Ok(()) => success(format!("Repository {} metadata refreshed", repo)),
        Err(resp) => resp,
    }
}

async fn checksum(state: Arc<ServerState>, repo: String, filename: String) -> Response {
    let service = state.service.clone();
    let (r, f) = (repo.clone(), filename.clone());
    match blocking(move || service.package_checksum(&r, &f)).await {
        Ok(sha256) => Json(PackageChecksum {
            repo,
            filename,
            sha256,
        })
        .into_response(),
        Err(resp) => resp,
    }
}

async fn download_package(state: Arc<ServerState>, repo: String, filename: String) -> Response {
    let service = state.service.clone();
    let (r, f) = (repo.clone(), filename.clone());
    let reader = match blocking(move || service.download_package(&r, &f)).await {
        Ok(reader) => reader,
        Err(resp) => return resp,
    };
    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", filename),
        )
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(stream_blocking_reader(reader))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn serve_metadata(state: Arc<ServerState>, repo: String, path: String) -> Response {
    let service = state.service.clone();
    let (r, p) = (repo.clone(), path.clone());
    let reader = match blocking(move || service.open_metadata(&r, &p)).await {
        Ok(reader) => reader,
        Err(resp) => return resp,
    };
    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .header(header::CACHE_CONTROL, "public, max-age=300")
        .body(stream_blocking_reader(reader))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Artifact access inside a repository. An empty tail lists the
/// repository; repositories on the local backend are streamed straight
/// from disk, everything else goes through the service.
async fn serve_repo_file(state: Arc<ServerState>, repo: String, path: String) -> Response {
    if path.is_empty() {
        let service = state.service.clone();
        let repo_name = repo.clone();
        return match blocking(move || service.list_packages(&repo_name)).await {
            Ok(packages) => Json(packages).into_response(),
            Err(resp) => resp,
        };
    }

    let service = state.service.clone();
    let repo_name = repo.clone();
    let ty = match blocking(move || service.repo_type(&repo_name)).await {
        Ok(ty) => ty,
        Err(resp) => return resp,
    };

    if ty == crate::repo::RepoType::Files {
        return download_package(state, repo, path).await;
    }

    // Local-backed repository: serve the file straight off disk, with
    // a containment check against the storage root.
    let root = match tokio::fs::canonicalize(&state.config.storage_root).await {
        Ok(root) => root,
        Err(e) => {
            error!("storage root unavailable: {}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
        }
    };
    let target = match tokio::fs::canonicalize(root.join(&repo).join(&path)).await {
        Ok(target) => target,
        Err(_) => return failure(StatusCode::NOT_FOUND, "file not found"),
    };
    if !target.starts_with(&root) {
        warn!(repo, path, "refusing path escaping the storage root");
        return failure(StatusCode::NOT_FOUND, "file not found");
    }

    match tokio::fs::File::open(&target).await {
        Ok(file) => Response::builder()
            .header(header::CONTENT_TYPE, content_type_for(&path))
            .body(Body::from_stream(ReaderStream::new(file)))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(_) => failure(StatusCode::NOT_FOUND, "file not found"),
    }
}

async fn repo_info(state: Arc<ServerState>, repo: String) -> Response {
    let service = state.service.clone();
    let repo_name = repo.clone();
    match blocking(move || service.repo_info(&repo_name)).await {
        Ok(info) => Json(info).into_response(),
        Err(resp) => resp,
    }
}

async fn delete_repo(state: Arc<ServerState>, repo: String) -> Response {
    let service = state.service.clone();
    let repo_name = repo.clone();
    match blocking(move || service.delete_repo(&repo_name)).await {
        Ok(()) => success(format!("Repository {} deleted", repo)),
        Err(resp) => resp,
    }
}
