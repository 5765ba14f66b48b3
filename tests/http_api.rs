//! HTTP API tests using `tower::ServiceExt::oneshot` against the router.

use std::fs;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use docsync::config::Config;
use docsync::server::router;
use docsync::RagContext;
use docsync_core::embedding::HashEmbedder;
use docsync_core::search::NOT_INITIALIZED;
use docsync_core::store::memory::InMemoryIndex;

fn app(tmp: &TempDir, files: &[(&str, &str)]) -> Router {
    let mut cfg = Config::default();
    cfg.paths.data_dir = tmp.path().join("data");
    cfg.paths.index_dir = tmp.path().join("index");
    cfg.scanner.extensions = vec!["txt".to_string()];
    if !files.is_empty() {
        fs::create_dir_all(&cfg.paths.data_dir).unwrap();
        for (name, body) in files {
            fs::write(cfg.paths.data_dir.join(name), body).unwrap();
        }
    }
    let ctx = RagContext::with_parts(
        cfg,
        Arc::new(InMemoryIndex::new()),
        Arc::new(HashEmbedder::default()),
    );
    router(Arc::new(ctx))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let tmp = TempDir::new().unwrap();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app(&tmp, &[]).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["initialized"], false);
}

#[tokio::test]
async fn search_before_sync_returns_sentinel() {
    let tmp = TempDir::new().unwrap();
    let resp = app(&tmp, &[])
        .oneshot(post_json("/search", serde_json::json!({ "query": "anything" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["result"], NOT_INITIALIZED);
    assert_eq!(json["hits"], serde_json::json!([]));
}

#[tokio::test]
async fn empty_query_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let resp = app(&tmp, &[])
        .oneshot(post_json("/search", serde_json::json!({ "query": "   " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn sync_without_sources_is_unprocessable() {
    let tmp = TempDir::new().unwrap();
    let resp = app(&tmp, &[])
        .oneshot(post_json("/sync", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "no_sources");
}

#[tokio::test]
async fn sync_then_search_and_list_manifest() {
    let tmp = TempDir::new().unwrap();
    let app = app(
        &tmp,
        &[("guide.txt", "intro text\u{000c}install the widget carefully")],
    );

    let empty_body = Request::builder()
        .method("POST")
        .uri("/sync")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(empty_body).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let status = json_body(resp).await;
    assert_eq!(status["mode"], "fresh");
    assert_eq!(status["pdf_total"], 1);
    assert_eq!(status["added_pdfs"], 1);
    assert_eq!(status["chunks_added"], 2);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/search",
            serde_json::json!({ "query": "install the widget carefully", "k": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["hits"][0]["source"], "guide.txt");
    assert_eq!(json["hits"][0]["page"], 2);
    assert!(json["result"]
        .as_str()
        .unwrap()
        .starts_with("**Source:** guide.txt | **Page:** 2"));

    let req = Request::builder()
        .uri("/manifest")
        .body(Body::empty())
        .unwrap();
    let json = json_body(app.oneshot(req).await.unwrap()).await;
    assert_eq!(json["files"][0]["file"], "guide.txt");
}
