//! Router-level integration tests

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use karat_api::projects::{Project, ProjectStore};
use karat_api::{build_router, AppState};
use karat_common::cache::CacheStore;
use karat_common::config::Settings;
use karat_common::db;
use karat_common::model::{Appraisal, FileCredit, FolderNode, ProjectRef};

fn test_settings() -> Settings {
    Settings {
        database_path: PathBuf::from(":memory:"),
        listen_addr: "127.0.0.1:0".to_string(),
        size_threshold: 100_000,
        success_ttl_secs: 86_400,
        error_ttl_secs: 10,
        worker_slots: 1,
        clone_root: PathBuf::from("/tmp"),
        analyzer_command: "true".to_string(),
        poll_interval_ms: 10,
        visibility_timeout_secs: 600,
        finish_announce_secs: 0,
    }
}

async fn app_state() -> AppState {
    let pool = db::connect_memory().await.unwrap();
    db::init_schema(&pool).await.unwrap();
    AppState::new(pool, test_settings())
}

fn cached_root_json() -> String {
    let root = FolderNode {
        path: String::new(),
        line_count: 1000,
        total_credits: 1000.0,
        credit_share: BTreeMap::from([("alice".to_string(), 1.0)]),
        base_files: vec![FileCredit {
            path: "README.md".to_string(),
            line_count: 500,
            credit_share: BTreeMap::from([("alice".to_string(), 1.0)]),
        }],
        subfolders: vec![FolderNode {
            path: "app".to_string(),
            line_count: 500,
            total_credits: 500.0,
            credit_share: BTreeMap::from([("alice".to_string(), 1.0)]),
            base_files: vec![],
            subfolders: vec![],
            contributors: vec!["alice".to_string()],
        }],
        contributors: vec!["alice".to_string()],
    };
    let appraisal = Appraisal::ok(ProjectRef::new("octocat", "hello"), root);
    serde_json::to_string(&appraisal).unwrap()
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn health_reports_service_name() {
    let state = app_state().await;
    let (status, body) = get(build_router(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["service"], "karat-api");
}

#[tokio::test]
async fn cache_hit_returns_cached_body_exactly() {
    let state = app_state().await;
    ProjectStore::new(state.db.clone())
        .upsert(&Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 500,
        })
        .await
        .unwrap();
    let cached = cached_root_json();
    CacheStore::new(state.db.clone())
        .set("appraisal:octocat/hello/", &cached, 60)
        .await
        .unwrap();

    let (status, body) = get(build_router(state), "/api/appraisals/octocat/hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, cached);
}

#[tokio::test]
async fn subfolder_request_returns_extracted_tree() {
    let state = app_state().await;
    ProjectStore::new(state.db.clone())
        .upsert(&Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 500,
        })
        .await
        .unwrap();
    CacheStore::new(state.db.clone())
        .set("appraisal:octocat/hello/", &cached_root_json(), 60)
        .await
        .unwrap();

    let (status, body) = get(
        build_router(state),
        "/api/appraisals/octocat/hello?folder=app",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["folder"]["path"], "app");
    assert_eq!(json["folder"]["line_count"], 500);
}

#[tokio::test]
async fn missing_folder_is_404_with_distinct_message() {
    let state = app_state().await;
    ProjectStore::new(state.db.clone())
        .upsert(&Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 500,
        })
        .await
        .unwrap();
    CacheStore::new(state.db.clone())
        .set("appraisal:octocat/hello/", &cached_root_json(), 60)
        .await
        .unwrap();

    let (status, body) = get(
        build_router(state),
        "/api/appraisals/octocat/hello?folder=nonexistent",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["message"], "Folder not found in project");
}

#[tokio::test]
async fn cache_miss_is_202_with_request_id() {
    let state = app_state().await;
    ProjectStore::new(state.db.clone())
        .upsert(&Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 500,
        })
        .await
        .unwrap();
    let pool = state.db.clone();

    let (status, body) = get(
        build_router(state),
        "/api/appraisals/octocat/hello?request_id=req-7",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "processing");
    assert_eq!(json["request_id"], "req-7");
    assert!(json["msg"].as_str().unwrap().contains("req-7"));

    let depth: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appraisal_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(depth, 1);
}

#[tokio::test]
async fn unknown_project_is_404() {
    let state = app_state().await;
    let (status, _) = get(build_router(state), "/api/appraisals/nobody/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_project_is_403() {
    let state = app_state().await;
    ProjectStore::new(state.db.clone())
        .upsert(&Project {
            owner: "octocat".to_string(),
            name: "big".to_string(),
            size: 2_000_000,
        })
        .await
        .unwrap();

    let (status, _) = get(build_router(state), "/api/appraisals/octocat/big").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn register_project_then_cache_admin_roundtrip() {
    let state = app_state().await;
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/projects")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"owner":"octocat","name":"hello","size":10}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    CacheStore::new(state.db.clone())
        .set("appraisal:octocat/hello/", "{}", 60)
        .await
        .unwrap();

    let (status, body) = get(app.clone(), "/api/cache/keys").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["keys"][0], "appraisal:octocat/hello/");

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["removed"], 1);
}
