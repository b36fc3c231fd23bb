//! Upload pipeline tests against a scripted in-process HTTP server.

use std::io::Write;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use libsocialbu::{Config, FileResolver, SocialBuClient, UploadStep};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

/// Which pipeline step the scripted server should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ok,
    FailSlot,
    FailStorage,
    EmptyToken,
}

#[derive(Debug, Clone)]
struct ServerState {
    base: String,
    mode: Mode,
}

async fn start_server(mode: Mode) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = ServerState {
        base: base.clone(),
        mode,
    };
    let app = Router::new()
        .route("/upload_media", post(upload_slot))
        .route("/upload_media/status", get(upload_status))
        .route("/storage/object", put(storage_put))
        .route("/media/pic.png", get(serve_png))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    base
}

async fn upload_slot(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    match state.mode {
        Mode::FailSlot => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "slot unavailable"})),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "signed_url": format!("{}/storage/object", state.base),
                "key": "uploads/k1",
                "url": format!("{}/cdn/k1", state.base),
                "secure_key": "sk1",
            })),
        ),
    }
}

async fn storage_put(State(state): State<ServerState>, body: Bytes) -> (StatusCode, String) {
    if state.mode == Mode::FailStorage {
        return (StatusCode::FORBIDDEN, "access denied".to_string());
    }
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty body".to_string());
    }
    (StatusCode::OK, String::new())
}

async fn upload_status(State(state): State<ServerState>) -> Json<Value> {
    match state.mode {
        Mode::EmptyToken => Json(json!({"upload_token": ""})),
        _ => Json(json!({"upload_token": "tok-123"})),
    }
}

async fn serve_png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES.to_vec())
}

fn client_for(base: &str) -> SocialBuClient {
    let config = Config {
        token: Some("test-token".to_string()),
        base_url: base.to_string(),
        ..Config::default()
    };
    SocialBuClient::new(&config).unwrap()
}

fn local_png() -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".png").unwrap();
    file.write_all(PNG_BYTES).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn upload_succeeds_through_all_three_steps() {
    let base = start_server(Mode::Ok).await;
    let client = client_for(&base);
    let file = local_png();

    let upload = client
        .upload_media_source(file.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(upload.upload_token, "tok-123");
    assert_eq!(upload.key, "uploads/k1");
    assert_eq!(upload.mime_type, "image/png");
    assert!(upload.name.ends_with(".png"));
}

#[tokio::test]
async fn slot_failure_is_tagged_at_the_signed_url_step() {
    let base = start_server(Mode::FailSlot).await;
    let client = client_for(&base);
    let file = local_png();

    let err = client
        .upload_media_source(file.path().to_str().unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::SignedUrl));
    assert_eq!(err.status_code(), Some(500));
    assert!(err.to_string().contains("Failed to get signed URL"));
}

#[tokio::test]
async fn storage_rejection_is_tagged_at_the_s3_upload_step() {
    let base = start_server(Mode::FailStorage).await;
    let client = client_for(&base);
    let file = local_png();

    let err = client
        .upload_media_source(file.path().to_str().unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::S3Upload));
    assert_eq!(err.status_code(), Some(403));
}

#[tokio::test]
async fn missing_token_is_tagged_at_the_confirmation_step() {
    let base = start_server(Mode::EmptyToken).await;
    let client = client_for(&base);
    let file = local_png();

    let err = client
        .upload_media_source(file.path().to_str().unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::Confirmation));
    assert!(err.to_string().contains("may still be processing"));
}

#[tokio::test]
async fn remote_sources_resolve_to_a_temp_file_cleaned_on_drop() {
    let base = start_server(Mode::Ok).await;
    let resolver = FileResolver::new(reqwest::Client::new());

    let resolved = resolver
        .resolve(&format!("{}/media/pic.png", base))
        .await
        .unwrap();

    assert_eq!(resolved.name, "pic.png");
    assert_eq!(resolved.mime_type, "image/png");
    assert_eq!(resolved.size, PNG_BYTES.len() as u64);

    let path = resolved.path().to_path_buf();
    assert!(path.exists());

    drop(resolved);
    assert!(!path.exists());
}

#[tokio::test]
async fn temp_file_is_removed_even_when_the_upload_fails() {
    let base = start_server(Mode::FailStorage).await;
    let client = client_for(&base);
    let resolver = FileResolver::new(reqwest::Client::new());

    let resolved = resolver
        .resolve(&format!("{}/media/pic.png", base))
        .await
        .unwrap();
    let path = resolved.path().to_path_buf();
    assert!(path.exists());

    let err = client.upload_resolved(resolved).await.unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::S3Upload));
    assert!(!path.exists());
}

#[tokio::test]
async fn temp_file_is_removed_when_the_slot_request_fails() {
    let base = start_server(Mode::FailSlot).await;
    let client = client_for(&base);
    let resolver = FileResolver::new(reqwest::Client::new());

    let resolved = resolver
        .resolve(&format!("{}/media/pic.png", base))
        .await
        .unwrap();
    let path = resolved.path().to_path_buf();
    assert!(path.exists());

    let err = client.upload_resolved(resolved).await.unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::SignedUrl));
    assert!(!path.exists());
}

#[tokio::test]
async fn temp_file_is_removed_when_confirmation_fails() {
    let base = start_server(Mode::EmptyToken).await;
    let client = client_for(&base);
    let resolver = FileResolver::new(reqwest::Client::new());

    let resolved = resolver
        .resolve(&format!("{}/media/pic.png", base))
        .await
        .unwrap();
    let path = resolved.path().to_path_buf();
    assert!(path.exists());

    let err = client.upload_resolved(resolved).await.unwrap_err();

    assert_eq!(err.upload_step(), Some(UploadStep::Confirmation));
    assert!(!path.exists());
}
