use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here requires a resolved `AuthUser` (the middleware layer is
/// applied in `create_router`). Authentication only establishes *who* is
/// calling; *what* they may do to a given project is decided per request by
/// the authorization engine inside each handler, following the resolve →
/// membership lookup → decision sequence.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The authenticated user's own profile.
        .route("/me", get(handlers::get_me))
        // GET /projects: membership-scoped listing, newest first.
        // POST /projects: creates a project plus its owner membership
        // atomically; the caller becomes owner.
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        // GET/PUT/DELETE /projects/{id}
        // view: any role; edit: owner|editor; delete: owner only, with the
        // explicit ordered cascade (comments, memberships, project).
        .route(
            "/projects/{id}",
            get(handlers::get_project_details)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        // POST /projects/{id}/members
        // Owner-only role grant. Duplicate (user, project) pairs are a 409;
        // there is no role-change or invitation flow.
        .route("/projects/{id}/members", post(handlers::add_member))
        // GET/POST /projects/{id}/comments
        // Listing needs reader membership; posting needs owner|editor.
        .route(
            "/projects/{id}/comments",
            get(handlers::get_comments).post(handlers::add_comment),
        )
}
