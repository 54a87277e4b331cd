// tests/server_api.rs

//! HTTP surface tests driven through the router with oneshot requests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{multipart_body, multipart_content_type, setup_router};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let (_root, app) = setup_router();
    let health = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ready = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_list_and_tree() {
    let (_root, app) = setup_router();

    for (name, ty) in [("centos/7/x86_64", "rpm"), ("blobs", "files")] {
        let created = app
            .clone()
            .oneshot(post_json(
                "/repos",
                &format!(r#"{{"name":"{}","type":"{}"}}"#, name, ty),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
    }

    let listed = app.oneshot(get("/repos")).await.unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let json = body_json(listed).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["tree"]["blobs"]["type"], "repo");
    assert_eq!(
        json["tree"]["centos"]["children"]["7"]["children"]["x86_64"]["path"],
        "centos/7/x86_64"
    );
}

#[tokio::test]
async fn test_create_rejects_bad_type_and_name() {
    let (_root, app) = setup_router();

    let bad_type = app
        .clone()
        .oneshot(post_json("/repos", r#"{"name":"x","type":"gem"}"#))
        .await
        .unwrap();
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

    let bad_name = app
        .oneshot(post_json("/repos", r#"{"name":"a//b","type":"rpm"}"#))
        .await
        .unwrap();
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_download_checksum_files_repo() {
    let (_root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"blobs","type":"files"}"#))
        .await
        .unwrap();

    let uploaded = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/repo/blobs/upload")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body(
                    &[("file", "data.bin", b"abc" as &[u8])],
                    None,
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(uploaded.status(), StatusCode::OK);

    let downloaded = app
        .clone()
        .oneshot(get("/repo/blobs/files/data.bin"))
        .await
        .unwrap();
    assert_eq!(downloaded.status(), StatusCode::OK);
    let bytes = downloaded.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"abc");

    let checksum = app
        .oneshot(get("/repo/blobs/checksum/data.bin"))
        .await
        .unwrap();
    assert_eq!(checksum.status(), StatusCode::OK);
    let json = body_json(checksum).await;
    assert_eq!(
        json["sha256"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(json["repo"], "blobs");
}

#[tokio::test]
async fn test_download_spans_multiple_body_chunks() {
    let (_root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"blobs","type":"files"}"#))
        .await
        .unwrap();

    // Larger than one 64 KiB chunk of the response body.
    let payload: Vec<u8> = (0..=255u8).cycle().take(300 * 1024).collect();
    let uploaded = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/repo/blobs/upload")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body(
                    &[("file", "big.bin", payload.as_slice())],
                    None,
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(uploaded.status(), StatusCode::OK);

    let downloaded = app
        .oneshot(get("/repo/blobs/files/big.bin"))
        .await
        .unwrap();
    assert_eq!(downloaded.status(), StatusCode::OK);
    let bytes = downloaded.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.len(), payload.len());
    assert_eq!(&bytes[..], &payload[..]);
}

#[tokio::test]
async fn test_batch_upload_partial_failure() {
    let (_root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"el9","type":"rpm"}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/repo/el9/upload")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body(
                    &[
                        ("files", "good.rpm", b"1" as &[u8]),
                        ("files", "bad.txt", b"2"),
                        ("files", "also.rpm", b"3"),
                    ],
                    Some("false"),
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    // Partial failure is still transport-level success.
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["success"], 2);
    assert_eq!(json["failed"], 1);

    let info = app.oneshot(get("/repo/el9")).await.unwrap();
    let json = body_json(info).await;
    assert_eq!(json["type"], "rpm");
    assert_eq!(json["package_count"], 2);
    assert_eq!(json["rpm_count"], 2);
}

#[tokio::test]
async fn test_rpm_download_and_metadata_routes() {
    let (root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"el9","type":"rpm"}"#))
        .await
        .unwrap();
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/repo/el9/upload")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body(
                    &[("file", "tool-1.0.rpm", b"rpmbytes" as &[u8])],
                    None,
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    let download = app
        .clone()
        .oneshot(get("/repo/el9/rpm/tool-1.0.rpm"))
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download.headers()["content-type"],
        "application/x-rpm"
    );
    let bytes = download.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"rpmbytes");

    // Handcrafted repodata served through the metadata route.
    let repodata = root.path().join("el9/repodata");
    std::fs::create_dir_all(&repodata).unwrap();
    std::fs::write(repodata.join("repomd.xml"), b"<repomd/>").unwrap();
    let metadata = app
        .clone()
        .oneshot(get("/repo/el9/repodata/repomd.xml"))
        .await
        .unwrap();
    assert_eq!(metadata.status(), StatusCode::OK);
    assert_eq!(metadata.headers()["content-type"], "application/xml");

    let missing = app
        .oneshot(get("/repo/el9/rpm/ghost.rpm"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_rejected_for_files_repo() {
    let (_root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"blobs","type":"files"}"#))
        .await
        .unwrap();

    let refresh = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/repo/blobs/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(refresh.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_repo_and_unknown_routes() {
    let (_root, app) = setup_router();
    app.clone()
        .oneshot(post_json("/repos", r#"{"name":"blobs","type":"files"}"#))
        .await
        .unwrap();

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/repo/blobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let info = app.clone().oneshot(get("/repo/blobs")).await.unwrap();
    assert_eq!(info.status(), StatusCode::NOT_FOUND);

    let nonsense = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/repo/anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(nonsense.status(), StatusCode::METHOD_NOT_ALLOWED);
}
