use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints accessible to any client, anonymous or logged-in. Only the
/// identity bootstrap lives here: everything project-scoped requires an
/// authenticated principal and sits behind the auth middleware instead.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness check for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an unverified account and mails out the verification code.
        .route("/register", post(handlers::register_user))
        // POST /verify
        // Confirms the mailed code and activates the account. Until this
        // succeeds the AuthUser extractor refuses the account entirely.
        .route("/verify", post(handlers::verify_email))
}
