use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use project_hub::{
    AppState, MemoryRepository, MockMailer,
    auth::{AuthUser, Claims},
    config::{AppConfig, Env},
    models::User,
    repository::RepositoryState,
};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

/// Signs a token for the given subject. A negative offset produces an
/// already-expired token.
fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: RepositoryState) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        repo,
        mailer: Arc::new(MockMailer::new()),
        config,
    }
}

/// Builds the Parts struct the extractor consumes from a bare request.
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    parts
}

async fn seed_user(repo: &RepositoryState, verified: bool) -> User {
    let user = repo
        .create_user("alice".to_string(), "alice@example.com".to_string())
        .await
        .expect("seed user");
    if verified {
        repo.mark_verified(user.id).await.expect("verify user")
    } else {
        user
    }
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let token = create_token(user.id, 3600);
    let mut parts = with_bearer(&token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let auth_user = auth_user.expect("valid token for a verified user must pass");
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.email, "alice@example.com");
}

#[tokio::test]
async fn test_auth_rejects_unverified_user_with_valid_jwt() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, false).await;
    let app_state = create_app_state(Env::Production, repo);

    // The signature checks out; the account state must still gate access.
    let token = create_token(user.id, 3600);
    let mut parts = with_bearer(&token);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_auth_rejects_token_for_deleted_user() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let app_state = create_app_state(Env::Production, repo);

    // Valid token, but no matching row in the user registry.
    let token = create_token(Uuid::new_v4(), 3600);
    let mut parts = with_bearer(&token);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_auth_rejects_expired_jwt() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, true).await;
    let app_state = create_app_state(Env::Production, repo);

    // Expired an hour ago, well past the default validation leeway.
    let token = create_token(user.id, -3600);
    let mut parts = with_bearer(&token);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_auth_rejects_token_signed_with_wrong_secret() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        sub: user.id,
        iat: now,
        exp: now + 3600,
    };
    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    let mut parts = with_bearer(&forged);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_local_bypass_header_resolves_verified_user() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, true).await;
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .expect("bypass must resolve a verified local user");
    assert_eq!(auth_user.id, user.id);
}

#[tokio::test]
async fn test_bypass_header_refused_in_production() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let user = seed_user(&repo, true).await;
    let app_state = create_app_state(Env::Production, repo);

    // Same header, same verified user, but the environment forbids it and
    // there is no bearer token to fall back on.
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}
