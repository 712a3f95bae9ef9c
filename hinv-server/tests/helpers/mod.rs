//! Shared setup for hinv-server integration tests
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use hinv_common::config::{LookupConfig, RootFolderInitializer, StorageLayout};
use hinv_common::db::init::{INITIAL_ADMIN_PASSWORD, INITIAL_ADMIN_USERNAME};
use hinv_server::db::Database;
use hinv_server::services::backup::BackupManager;
use hinv_server::services::images::ImageStore;
use hinv_server::services::lookup::{MetadataResolver, SettingsSource};
use hinv_server::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub layout: StorageLayout,
    _temp: TempDir,
}

/// Catalog endpoints that refuse connections
pub fn unreachable_lookup() -> LookupConfig {
    LookupConfig {
        google_books_url: "http://127.0.0.1:9".to_string(),
        open_library_url: "http://127.0.0.1:9".to_string(),
        discogs_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 1,
        image_timeout_secs: 1,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with_lookup(unreachable_lookup()).await
}

/// Fresh root folder, store and router
pub async fn test_app_with_lookup(lookup: LookupConfig) -> TestApp {
    let temp = tempfile::tempdir().unwrap();
    let initializer = RootFolderInitializer::new(temp.path().join("root"));
    initializer.ensure_directory_exists().unwrap();
    let layout = initializer.layout().clone();

    let backups = BackupManager::new(
        layout.clone(),
        layout.default_database_url(),
        Duration::from_millis(0),
    );
    let db = Database::open(backups.store_destination_path().unwrap())
        .await
        .unwrap();
    let settings: Arc<dyn SettingsSource> = Arc::new(db.clone());
    let resolver = MetadataResolver::with_default_providers(&lookup, settings).unwrap();
    let images = ImageStore::new(&layout.upload_dir, lookup.image_timeout_secs).unwrap();

    let state = AppState::new(db, resolver, backups, images);
    TestApp {
        router: build_router(state.clone()),
        state,
        layout,
        _temp: temp,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Log in and return the session token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login as {}", username);
        let body = body_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login_admin(&self) -> String {
        self.login(INITIAL_ADMIN_USERNAME, INITIAL_ADMIN_PASSWORD).await
    }

    /// Create a user with the "User" role and log in as them
    pub async fn login_new_user(&self, admin_token: &str, username: &str) -> String {
        let roles = body_json(
            self.send(json_request(Method::GET, "/api/admin/roles", Some(admin_token), None))
                .await,
        )
        .await;
        let role_id = roles
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == "User")
            .unwrap()["id"]
            .as_i64()
            .unwrap();

        let response = self
            .send(json_request(
                Method::POST,
                "/api/admin/users",
                Some(admin_token),
                Some(serde_json::json!({
                    "username": username,
                    "password": "secret",
                    "role_id": role_id
                })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        self.login(username, "secret").await
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Single-file multipart form request
pub fn multipart_request(
    uri: &str,
    token: &str,
    field: &str,
    filename: &str,
    data: &[u8],
) -> Request<Body> {
    let boundary = "hinv-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
