use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents a registered principal from the `users` table. Accounts start
/// unverified; the `verification_code` is mailed out at registration and the
/// account only becomes usable once `/verify` has been called with it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    // The user's primary identifier, unique across the system.
    pub email: String,
    // False until the emailed verification code is confirmed.
    pub is_verified: bool,
    /// One-shot code mailed at registration. Never serialized to clients;
    /// defaults to nil when decoding a client-facing payload.
    #[serde(skip_serializing, default)]
    pub verification_code: Uuid,
}

/// Role
///
/// The per-project standing a principal can hold. A principal holds at most
/// one role per project (unique key on `project_members(user_id, project_id)`).
/// Stored as lowercase text in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Owner,
    Editor,
    Reader,
}

impl Role {
    /// The canonical database/text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Reader => "reader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "editor" => Ok(Role::Editor),
            "reader" => Ok(Role::Reader),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Project
///
/// A collaboration space owned by exactly one principal. The `owner_id` is
/// denormalized for fast creator checks, but the authoritative grant is the
/// owner row in `project_members`, created in the same transaction as the
/// project itself.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Project {
    pub id: Uuid,
    // FK to users.id; mirrors the role=owner membership row.
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Membership
///
/// Binds a principal to a project with a role. Insert/lookup only: changing
/// an existing member's role is not supported through the store, so a second
/// grant for the same (user, project) pair is always a conflict.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Membership {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: Role,
}

/// Comment
///
/// A comment record from the `comments` table, augmented with the author's
/// email (a join operation in the repository).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    // BigInt (i64) id; comments are the highest-volume table.
    pub id: i64,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Loaded via a JOIN with `users` in the repository query.
    #[sqlx(default)]
    pub author_email: Option<String>,
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Credential handling lives with the external auth provider; this service
/// only records the identity and drives email verification.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
}

/// VerifyEmailRequest
///
/// Input payload for confirming a mailed verification code (POST /verify).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub verification_code: Uuid,
}

/// CreateProjectRequest
///
/// Input payload for creating a project (POST /projects). The caller becomes
/// the owner; an owner membership row is established atomically.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

/// UpdateProjectRequest
///
/// Partial update payload for modifying an existing project (PUT /projects/{id}).
/// Uses `Option<T>` with `skip_serializing_if` so only provided fields travel
/// in the JSON payload and only those columns are touched.
///
/// An explicit `null` deserializes to `None` and is indistinguishable from an
/// omitted field, so a description can be replaced but not cleared through
/// this payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProjectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// AddMemberRequest
///
/// Input payload for granting a role on a project (POST /projects/{id}/members).
/// Owner-only; a principal already holding a role yields a 409 conflict.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Role,
}

/// CreateCommentRequest
///
/// Input payload for posting a new comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// --- Profile Schemas (Output) ---

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_verified: user.is_verified,
        }
    }
}
