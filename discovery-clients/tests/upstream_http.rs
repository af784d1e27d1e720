use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use discovery_clients::{
    ApiClient, ClientError, CoursesApiClient, CoursesSource, OrganizationsApiClient,
    OrganizationsSource, RetryPolicy,
};
use discovery_shared::{SourceAuth, SourceEndpoint};

#[derive(Clone)]
struct Upstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

async fn serve(app: Router<Upstream>, hits: Arc<AtomicUsize>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app.with_state(Upstream { addr, hits });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn endpoint(addr: SocketAddr, auth: SourceAuth) -> SourceEndpoint {
    SourceEndpoint {
        url: format!("http://{}/api/", addr),
        auth,
    }
}

fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(2),
        max_delay: Duration::from_millis(10),
    }
}

async fn paged_courses(
    State(upstream): State<Upstream>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    assert_eq!(params.get("page_size").map(String::as_str), Some("100"));
    match params.get("page").map(String::as_str) {
        None => Json(json!({
            "next": format!("http://{}/api/courses/?page=2&page_size=100", upstream.addr),
            "results": [{"id": " course-v1:MITx+0.111x+2T2015 ", "name": "Intro"}]
        })),
        _ => Json(json!({
            "next": null,
            "results": [
                {"id": "course-v1:MITx+0.112x+1T2016", "name": ""},
                {"name": "missing id"}
            ]
        })),
    }
}

#[tokio::test]
async fn test_pagination_follows_next_and_normalizes() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/api/courses/", get(paged_courses));
    let addr = serve(app, hits.clone()).await;

    let client = CoursesApiClient::new(&endpoint(addr, SourceAuth::None)).unwrap();
    let result = client.list_course_runs().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].id, "course-v1:MITx+0.111x+2T2015");
    assert!(result.records[1].name.is_none());
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].index, 2);
}

async fn flaky(State(upstream): State<Upstream>) -> Result<Json<Value>, StatusCode> {
    let attempt = upstream.hits.fetch_add(1, Ordering::SeqCst);
    if attempt < 2 {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!([{"short_name": "MITx", "name": "MIT"}])))
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/api/organizations/", get(flaky));
    let addr = serve(app, hits.clone()).await;

    let api = ApiClient::with_options(
        &endpoint(addr, SourceAuth::None),
        Duration::from_secs(2),
        fast_retry(5),
    )
    .unwrap();
    let client = OrganizationsApiClient::from_api(api);
    let result = client.list_organizations().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(result.records[0].key, "MITx");
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/api/organizations/",
        get(|State(upstream): State<Upstream>| async move {
            upstream.hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::BAD_GATEWAY
        }),
    );
    let addr = serve(app, hits.clone()).await;

    let api = ApiClient::with_options(
        &endpoint(addr, SourceAuth::None),
        Duration::from_secs(2),
        fast_retry(5),
    )
    .unwrap();
    let err = OrganizationsApiClient::from_api(api)
        .list_organizations()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(hits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/api/organizations/",
        get(|State(upstream): State<Upstream>| async move {
            upstream.hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::NOT_FOUND, "gone")
        }),
    );
    let addr = serve(app, hits.clone()).await;

    let api = ApiClient::with_options(
        &endpoint(addr, SourceAuth::None),
        Duration::from_secs(2),
        fast_retry(5),
    )
    .unwrap();
    let err = OrganizationsApiClient::from_api(api)
        .list_organizations()
        .await
        .unwrap_err();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    match err {
        ClientError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "gone");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/api/organizations/",
        get(
            |State(upstream): State<Upstream>, headers: HeaderMap| async move {
                upstream.hits.fetch_add(1, Ordering::SeqCst);
                match headers.get("authorization").and_then(|h| h.to_str().ok()) {
                    Some("Bearer partner-token") => Ok(Json(json!([]))),
                    _ => Err(StatusCode::UNAUTHORIZED),
                }
            },
        ),
    );
    let addr = serve(app, hits.clone()).await;

    let authed = OrganizationsApiClient::new(&endpoint(
        addr,
        SourceAuth::Bearer {
            token: "partner-token".into(),
        },
    ))
    .unwrap();
    assert!(authed.list_organizations().await.is_ok());

    let anonymous = OrganizationsApiClient::new(&endpoint(addr, SourceAuth::None)).unwrap();
    let err = anonymous.list_organizations().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_oauth2_token_is_cached() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/oauth2/access_token",
            axum::routing::post(|State(upstream): State<Upstream>| async move {
                upstream.hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({"access_token": "issued", "token_type": "JWT", "expires_in": 3600}))
            }),
        )
        .route(
            "/api/organizations/",
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|h| h.to_str().ok()) {
                    Some("JWT issued") => Ok(Json(json!([]))),
                    _ => Err(StatusCode::UNAUTHORIZED),
                }
            }),
        );
    let addr = serve(app, hits.clone()).await;

    let client = OrganizationsApiClient::new(&endpoint(
        addr,
        SourceAuth::Oauth2 {
            token_url: format!("http://{}/oauth2/access_token", addr),
            client_id: "id".into(),
            client_secret: "secret".into(),
        },
    ))
    .unwrap();
    client.list_organizations().await.unwrap();
    client.list_organizations().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
