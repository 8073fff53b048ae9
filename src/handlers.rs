use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, Action, Decision},
    error::ApiError,
    models::{
        AddMemberRequest, Comment, CreateCommentRequest, CreateProjectRequest, Membership,
        Project, RegisterUserRequest, UpdateProjectRequest, User, UserProfile,
        VerifyEmailRequest,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use uuid::Uuid;

// --- Request Authorization Protocol ---

/// authorize_project
///
/// The standard per-request sequence every project-scoped operation follows:
///
/// 1. Resolve the project by id. Absent yields NotFound, which is a distinct
///    outcome from Deny (the API intentionally returns 404 vs 403).
/// 2. Look up the principal's role in the membership store.
/// 3. Feed the role and the requested action to the authorization engine.
///
/// A store failure in either lookup aborts the request with Internal. It is
/// never folded into NotFound or Deny: no authorization decision is rendered
/// from a read that did not complete.
///
/// On Allow, the resolved project is handed back so handlers never fetch it
/// twice. Stateless per request: nothing is retained beyond the supplied
/// principal id.
pub async fn authorize_project(
    repo: &RepositoryState,
    principal: Uuid,
    project_id: Uuid,
    action: Action,
) -> Result<Project, ApiError> {
    let project = repo
        .get_project(project_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let role = repo.get_role(principal, project_id).await?;

    match authz::authorize(role, action) {
        Decision::Allow => Ok(project),
        Decision::Deny => {
            tracing::warn!(%principal, %project_id, ?action, "access denied");
            Err(ApiError::Denied)
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be empty"));
    }
    Ok(())
}

// --- User Handlers ---

/// register_user
///
/// [Public Route] Registers a new user and mails out a verification code.
/// Delivery failure is logged but does not fail the registration: the
/// account is unusable until verified either way, and the code can be
/// re-sent out of band.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    require_non_empty("username", &payload.username)?;
    require_non_empty("email", &payload.email)?;
    if !payload.email.contains('@') {
        return Err(ApiError::validation("email", "must be a valid email address"));
    }

    let user = state
        .repo
        .create_user(payload.username, payload.email)
        .await?;

    if let Err(e) = state
        .mailer
        .send_verification(&user.email, user.verification_code)
        .await
    {
        tracing::warn!(email = %user.email, "verification email failed: {e}");
    } else {
        tracing::info!(email = %user.email, "user registered, verification email sent");
    }

    Ok((StatusCode::CREATED, Json(user)))
}

/// verify_email
///
/// [Public Route] Confirms a mailed verification code and activates the
/// account. A wrong (email, code) pair and an already-verified account are
/// both validation failures, with distinct messages.
#[utoipa::path(
    post,
    path = "/verify",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid code or already verified")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await
        .filter(|u| u.verification_code == payload.verification_code)
        .ok_or_else(|| {
            ApiError::validation("verification_code", "Invalid email or verification code.")
        })?;

    if user.is_verified {
        return Err(ApiError::validation("email", "User is already verified."));
    }

    state.repo.mark_verified(user.id).await?;
    tracing::info!(email = %payload.email, "user email verified");

    Ok(Json(json!({ "message": "Email verified successfully!" })))
}

/// get_me
///
/// [Authenticated Route] Returns the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state.repo.get_user(id).await.ok_or(ApiError::NotFound)?;
    Ok(Json(UserProfile::from(user)))
}

// --- Project Handlers ---

/// list_projects
///
/// [Authenticated Route] Lists every project in which the requesting user
/// holds any role, newest first. Membership-scoped: there is no global or
/// public project listing.
#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "My projects", body = [Project]))
)]
pub async fn list_projects(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Project>> {
    Json(state.repo.get_projects_for_user(id).await)
}

/// create_project
///
/// [Authenticated Route] Creates a project with the caller as owner. The
/// repository establishes the owner membership in the same transaction, so
/// a project without an owner row is never observable.
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Created", body = Project),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_project(
    AuthUser { id, email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    require_non_empty("name", &payload.name)?;

    let project = state
        .repo
        .create_project(id, payload.name, payload.description)
        .await?;

    tracing::info!(owner = %email, project = %project.name, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// get_project_details
///
/// [Authenticated Route] Retrieves a single project. Action: `view`, so any
/// role suffices; non-members get 403, a missing id gets 404.
#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Found", body = Project),
        (status = 403, description = "Not a member"),
        (status = 404, description = "No such project")
    )
)]
pub async fn get_project_details(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = authorize_project(&state.repo, user_id, project_id, Action::View).await?;
    Ok(Json(project))
}

/// update_project
///
/// [Authenticated Route] Partially updates a project's name/description.
/// Action: `edit` (owner or editor). A provided-but-empty name is rejected
/// before anything is written.
#[utoipa::path(
    put,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated", body = Project),
        (status = 403, description = "Insufficient role")
    )
)]
pub async fn update_project(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    authorize_project(&state.repo, user_id, project_id, Action::Edit).await?;

    if let Some(name) = &payload.name {
        require_non_empty("name", name)?;
    }

    let project = state.repo.update_project(project_id, payload).await?;
    Ok(Json(project))
}

/// delete_project
///
/// [Authenticated Route] Deletes a project. Action: `delete` (owner only).
/// The repository removes comments and memberships before the project row,
/// in one transaction.
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such project")
    )
)]
pub async fn delete_project(
    AuthUser { id: user_id, email }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize_project(&state.repo, user_id, project_id, Action::Delete).await?;

    state.repo.delete_project(project_id).await?;
    tracing::info!(owner = %email, %project_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Membership Handlers ---

/// add_member
///
/// [Authenticated Route] Grants a role on the project to another principal.
/// Action: `manage_members` (owner only). A principal already holding a
/// role yields 409; role changes are not expressible through this endpoint.
#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = Membership),
        (status = 403, description = "Only owners assign roles"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn add_member(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    authorize_project(&state.repo, user_id, project_id, Action::ManageMembers).await?;

    if state.repo.get_user(payload.user_id).await.is_none() {
        return Err(ApiError::validation("user_id", "no such user"));
    }

    let membership = state
        .repo
        .add_member(project_id, payload.user_id, payload.role)
        .await?;

    tracing::info!(member = %payload.user_id, %project_id, role = %payload.role, "role granted");
    Ok((StatusCode::CREATED, Json(membership)))
}

// --- Comment Handlers ---

/// add_comment
///
/// [Authenticated Route] Posts a comment. Action: `comment` (owner or
/// editor); readers can see the thread but not write into it.
#[utoipa::path(
    post,
    path = "/projects/{id}/comments",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 403, description = "Insufficient role")
    )
)]
pub async fn add_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    authorize_project(&state.repo, user_id, project_id, Action::Comment).await?;
    require_non_empty("text", &payload.text)?;

    let comment = state
        .repo
        .add_comment(project_id, user_id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// get_comments
///
/// [Authenticated Route] Lists a project's comments. Action: `view`, so
/// listing requires at least reader membership. Any authenticated user
/// being able to read a thread by guessing its id is not acceptable here.
#[utoipa::path(
    get,
    path = "/projects/{id}/comments",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 403, description = "Not a member")
    )
)]
pub async fn get_comments(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    authorize_project(&state.repo, user_id, project_id, Action::View).await?;
    Ok(Json(state.repo.get_comments(project_id).await))
}
