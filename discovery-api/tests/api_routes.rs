use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use discovery_api::{create_app, ApiConfig, AppState, Claims, JwtSettings, JwtValidator};
use discovery_currency::{ExchangeRateService, MockRateFetcher, RatePayload};
use discovery_repository::{CatalogService, InMemoryCatalogStore};
use discovery_search_repository::{InMemorySearchProvider, SearchIndexService};
use discovery_search_shared::{ContentType, SearchDocument};
use discovery_shared::{Catalog, ChangeContext, Course, CourseRun, Organization};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const WORKER: &str = "retirement_worker";

struct TestApp {
    app: Router,
    catalog: CatalogService,
    search: SearchIndexService,
    jwt: Arc<JwtValidator>,
}

impl TestApp {
    async fn new() -> Self {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let search = SearchIndexService::new(Arc::new(InMemorySearchProvider::new()));
        search.ensure_alias().await.unwrap();
        let rates = ExchangeRateService::new(Arc::new(MockRateFetcher::new(RatePayload {
            base: "USD".into(),
            timestamp: 1_700_000_000,
            rates: BTreeMap::from([("EUR".to_string(), 0.92), ("USD".to_string(), 1.0)]),
        })));
        let jwt = Arc::new(JwtValidator::new(&JwtSettings::hmac(SECRET)).unwrap());

        let state = AppState {
            catalog: catalog.clone(),
            search: search.clone(),
            rates: Arc::new(rates),
            jwt: jwt.clone(),
            config: Arc::new(ApiConfig {
                page_size: 2,
                username_replacement_worker: Some(WORKER.to_string()),
                ..Default::default()
            }),
        };

        Self {
            app: create_app(state),
            catalog,
            search,
            jwt,
        }
    }

    fn token(&self, username: &str) -> String {
        let now = Utc::now().timestamp();
        self.jwt
            .sign(&Claims {
                preferred_username: Some(username.to_string()),
                sub: None,
                administrator: false,
                iss: None,
                aud: None,
                exp: now + 300,
                iat: now,
            })
            .unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).header("host", "localhost");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn seed_courses(&self, count: usize) -> Vec<Course> {
        let ctx = ChangeContext::refresh().with_user("editor");
        let partner = self.catalog.ensure_partner("edx", "edX").await.unwrap();
        let mut courses = Vec::new();
        for n in 0..count {
            let course = self
                .catalog
                .save_course(
                    &Course {
                        partner_id: partner.id,
                        key: format!("MITx+{n}.00x"),
                        title: Some(format!("Course {n}")),
                        ..Default::default()
                    },
                    None,
                    &ctx,
                )
                .await
                .unwrap()
                .into_entity();
            courses.push(course);
        }
        courses
    }
}

#[tokio::test]
async fn requests_without_a_valid_token_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/v1/courses", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.get("/api/v1/courses", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let now = Utc::now().timestamp();
    let expired = app
        .jwt
        .sign(&Claims {
            preferred_username: Some("staff".into()),
            sub: None,
            administrator: false,
            iss: None,
            aud: None,
            exp: now - 10,
            iat: now - 600,
        })
        .unwrap();
    let (status, _) = app.get("/api/v1/courses", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn course_listing_is_paginated_behind_a_proxy() {
    let app = TestApp::new().await;
    app.seed_courses(3).await;
    let token = app.token("staff");

    let request = Request::builder()
        .uri("/api/v1/courses?partner=edx")
        .header("host", "10.0.0.4:8000")
        .header("x-forwarded-host", "discovery.example.org")
        .header("x-forwarded-proto", "https")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["key"], "MITx+0.00x");
    assert_eq!(body["results"][0]["partner"], "edx");
    assert_eq!(
        body["next"],
        "https://discovery.example.org/api/v1/courses?partner=edx&page=2"
    );
    assert_eq!(body["previous"], Value::Null);

    let (status, body) = app.get("/api/v1/courses?partner=edx&page=2", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["previous"], "http://localhost/api/v1/courses?partner=edx");

    let (status, _) = app.get("/api/v1/courses?page=9", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn course_detail_includes_its_runs() {
    let app = TestApp::new().await;
    let course = app.seed_courses(1).await.remove(0);
    app.catalog
        .save_course_run(
            &CourseRun {
                partner_id: course.partner_id,
                course_id: course.id,
                key: "course-v1:MITx+0.00x+1T2025".into(),
                ..Default::default()
            },
            None,
            &ChangeContext::refresh(),
        )
        .await
        .unwrap();
    let token = app.token("staff");

    let (status, body) = app
        .get(&format!("/api/v1/courses/{}", course.uuid), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course_runs"][0]["key"], "course-v1:MITx+0.00x+1T2025");

    let (status, body) = app
        .get("/api/v1/course_runs/course-v1:MITx+0.00x+1T2025", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course_id"], course.id);

    let (status, _) = app
        .get(&format!("/api/v1/courses/{}", uuid::Uuid::new_v4()), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/courses/not-a-uuid", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn organizations_are_listed_per_partner() {
    let app = TestApp::new().await;
    let edx = app.catalog.ensure_partner("edx", "edX").await.unwrap();
    let other = app.catalog.ensure_partner("mitx", "MITx").await.unwrap();
    for (partner_id, key) in [(edx.id, "HarvardX"), (other.id, "MITx")] {
        app.catalog
            .save_organization(
                &Organization {
                    partner_id,
                    key: key.into(),
                    ..Default::default()
                },
                None,
                &ChangeContext::refresh(),
            )
            .await
            .unwrap();
    }

    let (status, body) = app
        .get("/api/v1/organizations?partner=edx", Some(&app.token("staff")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["key"], "HarvardX");
}

#[tokio::test]
async fn catalog_courses_are_limited_to_viewers() {
    let app = TestApp::new().await;
    let catalog = app
        .catalog
        .save_catalog(
            &Catalog {
                name: "Data science".into(),
                query: "python".into(),
                viewers: vec!["alice".into()],
                ..Default::default()
            },
            &ChangeContext::default(),
        )
        .await
        .unwrap()
        .into_entity();

    let mut course = SearchDocument::new(uuid::Uuid::new_v4(), ContentType::Course, "edx");
    course.title = Some("Python for Research".into());
    let mut run = SearchDocument::new(uuid::Uuid::new_v4(), ContentType::CourseRun, "edx");
    run.title = Some("Python for Research".into());
    app.search.upsert(&course).await.unwrap();
    app.search.upsert(&run).await.unwrap();

    let uri = format!("/api/v1/catalogs/{}/courses", catalog.id);
    let (status, body) = app.get(&uri, Some(&app.token("alice"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["uuid"], course.uuid.to_string());

    let (status, body) = app.get(&uri, Some(&app.token("mallory"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = app
        .get("/api/v1/catalogs/999/courses", Some(&app.token("alice")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_all_returns_facets() {
    let app = TestApp::new().await;
    for (content_type, pacing) in [
        (ContentType::CourseRun, "self_paced"),
        (ContentType::CourseRun, "instructor_paced"),
        (ContentType::Program, "self_paced"),
    ] {
        let mut doc = SearchDocument::new(uuid::Uuid::new_v4(), content_type, "edx");
        doc.title = Some("Data Analysis".into());
        doc.pacing_type = Some(pacing.into());
        app.search.upsert(&doc).await.unwrap();
    }
    let token = app.token("staff");

    let (status, body) = app.get("/api/v1/search/all?q=data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let content_types = body["facets"]["content_type"].as_array().unwrap();
    assert!(content_types
        .iter()
        .any(|f| f["value"] == "course_run" && f["count"] == 2));

    let (status, body) = app
        .get(
            "/api/v1/search/all?q=data&selected_facets=pacing_type%3Aself_paced",
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, _) = app
        .get("/api/v1/search/all?selected_facets=color%3Ared", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn currency_overlays_countries() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/currency", Some(&app.token("staff"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["FRA"]["code"], "EUR");
    assert_eq!(body["USA"]["rate"], 1.0);
}

fn replace_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/replace_usernames")
        .header("host", "localhost")
        .header("content-type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn username_replacement_is_reserved_for_the_worker() {
    let app = TestApp::new().await;
    app.seed_courses(1).await;
    let worker = app.token(WORKER);

    let (status, _) = app
        .send(replace_request(
            &app.token("staff"),
            json!({"username_mappings": [{"editor": "editor_retired"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(replace_request(&worker, json!({"username_mappings": "editor"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(replace_request(
            &worker,
            json!({"username_mappings": [{"editor": "editor_retired"}, {"ghost": "ghost_retired"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let successful = body["successful_replacements"].as_array().unwrap();
    assert_eq!(successful.len(), 2);
    assert!(successful[0]["rows_updated"].as_u64().unwrap() >= 1);
    assert_eq!(successful[1]["rows_updated"], 0);
    assert!(body["failed_replacements"].as_array().unwrap().is_empty());
}
