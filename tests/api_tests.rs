use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use project_hub::{
    AppState, MemoryRepository, MockMailer, config::AppConfig, create_router,
    models::{Project, User},
    repository::RepositoryState,
};
use serde_json::json;
use std::sync::Arc;
use tokio::test;
use tower::ServiceExt;

// --- Test Utilities ---

/// Builds a full router over the in-memory backend, returning the repo
/// handle so tests can seed and inspect state directly.
fn test_app() -> (Router, RepositoryState, Arc<MockMailer>) {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let mailer = Arc::new(MockMailer::new());
    let state = AppState {
        repo: repo.clone(),
        mailer: mailer.clone(),
        // Env::Local, so the x-user-id bypass is active for these tests.
        config: AppConfig::default(),
    };
    (create_router(state), repo, mailer)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Tests ---

#[test]
async fn test_health_endpoint() {
    let (app, _, _) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
async fn test_authenticated_routes_reject_anonymous_requests() {
    let (app, _, _) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
async fn test_register_verify_then_access_projects() {
    let (app, repo, mailer) = test_app();

    // 1. Register through the HTTP surface.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            json!({ "username": "alice", "email": "alice@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let user: User = body_json(response).await;

    // 2. The bypass header refuses the still-unverified account.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/projects")
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 3. Verify using the code captured by the mock mailer.
    let code = mailer.sent.lock().unwrap()[0].1;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/verify",
            json!({ "email": "alice@example.com", "verification_code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 4. Create and list projects as the verified user.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/projects")
                .header("x-user-id", user.id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({ "name": "Roadmap", "description": "Q3 plan" }))
                        .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let project: Project = body_json(response).await;
    assert_eq!(project.name, "Roadmap");
    assert_eq!(project.owner_id, user.id);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/projects")
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Project> = body_json(response).await;
    assert_eq!(listed.len(), 1);

    // The owner membership landed with the project.
    assert!(repo.get_role(user.id, project.id).await.unwrap().is_some());
}

#[test]
async fn test_forbidden_and_not_found_are_distinct_over_http() {
    let (app, repo, _) = test_app();

    let owner = repo
        .create_user("owner".to_string(), "owner@example.com".to_string())
        .await
        .unwrap();
    repo.mark_verified(owner.id).await.unwrap();
    let stranger = repo
        .create_user("stranger".to_string(), "stranger@example.com".to_string())
        .await
        .unwrap();
    repo.mark_verified(stranger.id).await.unwrap();

    let project = repo
        .create_project(owner.id, "Hidden".to_string(), None)
        .await
        .unwrap();

    // Existing project, no membership: 403.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/projects/{}", project.id))
                .header("x-user-id", stranger.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Absent project: 404.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/projects/{}", uuid::Uuid::new_v4()))
                .header("x-user-id", stranger.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_duplicate_member_grant_is_conflict_over_http() {
    let (app, repo, _) = test_app();

    let owner = repo
        .create_user("owner".to_string(), "owner@example.com".to_string())
        .await
        .unwrap();
    repo.mark_verified(owner.id).await.unwrap();
    let member = repo
        .create_user("member".to_string(), "member@example.com".to_string())
        .await
        .unwrap();
    repo.mark_verified(member.id).await.unwrap();

    let project = repo
        .create_project(owner.id, "Crew".to_string(), None)
        .await
        .unwrap();

    let grant = |role: &str| {
        json_request(
            "POST",
            &format!("/projects/{}/members", project.id),
            json!({ "user_id": member.id, "role": role }),
        )
    };

    let mut first = grant("reader");
    first
        .headers_mut()
        .insert("x-user-id", owner.id.to_string().parse().unwrap());
    let response = app.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut second = grant("editor");
    second
        .headers_mut()
        .insert("x-user-id", owner.id.to_string().parse().unwrap());
    let response = app.clone().oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
