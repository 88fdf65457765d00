use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use synapse_billing::azure_auth::{TokenProvider, build_http_client};
use synapse_billing::config::{Config, SQL_SCOPE, STORAGE_SCOPE};
use synapse_billing::error::{BillingError, SqlFailure};
use synapse_billing::storage::{BillingFormat, DfsClient, detect_format, discover};
use url::Url;

const ACCESS_TOKEN: &str = "fake-access-token";

#[derive(Clone, Default)]
struct FakeAzure {
    token_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
}

async fn token(
    State(state): State<FakeAzure>,
    Path(tenant): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    if tenant != "contoso" || form.get("client_secret").map(String::as_str) != Some("s3cret") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })),
        )
            .into_response();
    }
    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
    Json(json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3599
    }))
    .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {ACCESS_TOKEN}")[..])
        && headers.get("x-ms-version").is_some()
}

async fn list(
    State(state): State<FakeAzure>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(query.get("resource").map(String::as_str), Some("filesystem"));
    assert_eq!(query.get("recursive").map(String::as_str), Some("true"));
    assert_eq!(query.get("directory").map(String::as_str), Some("daily/focus"));

    match query.get("continuation").map(String::as_str) {
        None => (
            [("x-ms-continuation", "page-2")],
            Json(json!({"paths": [
                {"name": "daily/focus/20250201-20250228", "isDirectory": "true"},
                {
                    "name": "daily/focus/20250201-20250228/part_0.csv",
                    "contentLength": "2048",
                    "lastModified": "Sat, 01 Mar 2025 06:00:00 GMT"
                }
            ]})),
        )
            .into_response(),
        Some("page-2") => Json(json!({"paths": [
            {
                "name": "daily/focus/20250301-20250331/part_0.csv",
                "contentLength": "4096",
                "lastModified": "Tue, 01 Apr 2025 06:00:00 GMT"
            }
        ]}))
        .into_response(),
        Some(other) => panic!("unexpected continuation {other}"),
    }
}

async fn read_file(headers: HeaderMap, Path(path): Path<String>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(path, "daily/focus/20250301-20250331/part_0.csv");
    assert_eq!(
        headers.get("range").and_then(|v| v.to_str().ok()),
        Some("bytes=0-8191")
    );
    (
        StatusCode::PARTIAL_CONTENT,
        "\u{feff}BilledCost,BillingAccountId,ChargePeriodStart,EffectiveCost\n1.0,acct,2025-03-01,0.9\n",
    )
        .into_response()
}

async fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": {
            "code": "AuthorizationPermissionMismatch",
            "message": "This request is not authorized to perform this operation using this permission."
        }})),
    )
        .into_response()
}

async fn serve(state: FakeAzure) -> SocketAddr {
    let app = Router::new()
        .route("/{tenant}/oauth2/v2.0/token", post(token))
        .route("/billing", get(list))
        .route("/billing/{*path}", get(read_file))
        .route("/locked", get(forbidden))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, secret: &str) -> Config {
    Config {
        tenant_id: "contoso".into(),
        client_id: "client".into(),
        client_secret: secret.into(),
        storage_account: "billingstore".into(),
        container: "billing".into(),
        authority_host: format!("http://{addr}"),
        storage_dfs_endpoint: Some(Url::parse(&format!("http://{addr}/")).unwrap()),
        ..Config::default()
    }
}

#[tokio::test]
async fn tokens_are_cached_per_scope() {
    let state = FakeAzure::default();
    let addr = serve(state.clone()).await;
    let cfg = config(addr, "s3cret");
    let tokens = TokenProvider::from_config(&cfg, build_http_client(&cfg).unwrap()).unwrap();

    assert_eq!(tokens.token(SQL_SCOPE).await.unwrap(), ACCESS_TOKEN);
    assert_eq!(tokens.token(SQL_SCOPE).await.unwrap(), ACCESS_TOKEN);
    assert_eq!(state.token_calls.load(Ordering::SeqCst), 1);

    tokens.token(STORAGE_SCOPE).await.unwrap();
    assert_eq!(state.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_secret_is_a_server_error() {
    let state = FakeAzure::default();
    let addr = serve(state.clone()).await;
    let cfg = config(addr, "wrong");
    let tokens = TokenProvider::from_config(&cfg, build_http_client(&cfg).unwrap()).unwrap();

    match tokens.token(SQL_SCOPE).await {
        Err(BillingError::Oauth2Server { error }) => {
            assert!(error.contains("invalid_client"), "{error}");
            assert!(error.contains("AADSTS7000215"), "{error}");
        }
        other => panic!("expected an OAuth2 server error, got {other:?}"),
    }
    // Server errors are not retried.
    assert_eq!(state.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn discovers_pattern_across_pages_and_detects_format() {
    let state = FakeAzure::default();
    let addr = serve(state.clone()).await;
    let cfg = config(addr, "s3cret");
    let http = build_http_client(&cfg).unwrap();
    let tokens = TokenProvider::from_config(&cfg, http.clone()).unwrap();
    let dfs = DfsClient::from_config(&cfg, http, &tokens).unwrap();

    let scan = discover(&dfs, "/daily/focus/", "csv").await.unwrap();
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(scan.file_count(), 2);
    assert_eq!(scan.relative_pattern(), "daily/focus/*/*.csv");

    let (file, format) = detect_format(&dfs, &scan).await.unwrap();
    assert_eq!(file.name, "daily/focus/20250301-20250331/part_0.csv");
    assert_eq!(file.size, 4096);
    assert_eq!(format, BillingFormat::Focus);
    assert_eq!(state.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn storage_errors_keep_service_code() {
    let state = FakeAzure::default();
    let addr = serve(state).await;
    let cfg = config(addr, "s3cret");
    let http = build_http_client(&cfg).unwrap();
    let tokens = TokenProvider::from_config(&cfg, http.clone()).unwrap();
    let dfs = DfsClient::new(
        http,
        &tokens,
        Url::parse(&format!("http://{addr}")).unwrap(),
        "locked",
    );

    let err = dfs.list_paths("").await.unwrap_err();
    match &err {
        BillingError::StorageStatus { status, message } => {
            assert_eq!(status.as_u16(), 403);
            assert!(message.starts_with("AuthorizationPermissionMismatch: "), "{message}");
        }
        other => panic!("expected a storage status error, got {other:?}"),
    }
    assert_eq!(err.failure(), SqlFailure::PermissionDenied);
}
