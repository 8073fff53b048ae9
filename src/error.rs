use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// RepoError
///
/// Failure taxonomy for the repository. List reads degrade to empty results
/// directly; mutations and the authorization-critical lookups return
/// `Result<_, RepoError>` so uniqueness conflicts, absence, and store
/// failures stay distinguishable all the way up to the handler.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The (user, project) pair already holds a role. The store is
    /// insert/lookup only, so this is never silently upgraded to an update.
    #[error("membership already exists for this user and project")]
    DuplicateMembership,

    /// A user with this email is already registered.
    #[error("a user with this email already exists")]
    DuplicateUser,

    /// The referenced row is gone (e.g., delete raced with another delete).
    #[error("record not found")]
    NotFound,

    /// Collaborator store failure. Not locally recoverable and never retried
    /// automatically, since mutations are not guaranteed idempotent.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ApiError
///
/// The caller-visible error taxonomy, mapped onto HTTP statuses by the
/// `IntoResponse` impl below. Every handler returns `Result<_, ApiError>` so
/// the error surface stays uniform across routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing field; carries field-level detail for the client.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Uniqueness violation, surfaced as 409.
    #[error("{0}")]
    Conflict(String),

    /// Referenced project or user is absent. Deliberately distinct from
    /// `Denied`; the API returns 403/404 as separate outcomes.
    #[error("not found")]
    NotFound,

    /// Authorization failure. No further detail, to avoid leaking the
    /// project's role structure to non-members.
    #[error("access denied")]
    Denied,

    /// Fatal-for-this-request store or collaborator failure.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Denied => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateMembership | RepoError::DuplicateUser => {
                ApiError::Conflict(err.to_string())
            }
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Database(e) => {
                tracing::error!("repository failure: {e:?}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation { field, message } => json!({
                "error": message,
                "field": field,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
