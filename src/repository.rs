use crate::error::RepoError;
use crate::models::{Comment, Membership, Project, Role, UpdateProjectRequest, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations: the user
/// registry, the project store, the membership store, and the comment store.
/// Handlers interact with the data layer only through this trait, so the
/// concrete backend (Postgres in production, in-memory for tests and local
/// experimentation) is swappable.
///
/// List reads degrade to empty results on store failure. The lookups that
/// feed authorization (`get_project`, `get_role`) and all mutations return
/// `Result<_, RepoError>` instead: a failed read there must surface as a
/// store failure, never collapse into "absent".
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    // Fails with DuplicateUser if the email is already registered.
    async fn create_user(&self, username: String, email: String) -> Result<User, RepoError>;
    async fn mark_verified(&self, user_id: Uuid) -> Result<User, RepoError>;

    // --- Project Lifecycle ---
    /// Creates the project and its owner membership in one transaction.
    /// A reader must never observe the project without the owner row.
    async fn create_project(
        &self,
        owner_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Project, RepoError>;
    /// Ok(None) means no such project; a store failure is an error, not
    /// None, so it can never be mistaken for a 404.
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepoError>;
    // Partial update: only fields present in `req` are touched.
    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> Result<Project, RepoError>;
    /// Explicit ordered cascade: comments, then memberships, then the
    /// project row, all inside one transaction. Does not rely on any
    /// database-level ON DELETE CASCADE.
    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError>;
    /// Every project where the user holds any role, newest first.
    async fn get_projects_for_user(&self, user_id: Uuid) -> Vec<Project>;

    // --- Membership Store ---
    /// O(1) lookup by the (user, project) unique key. Ok(None) means the
    /// user has no standing on the project; a store failure is an error and
    /// must never be rendered as a Deny.
    async fn get_role(&self, user_id: Uuid, project_id: Uuid) -> Result<Option<Role>, RepoError>;
    /// Insert-only: an existing (user, project) pair fails with
    /// DuplicateMembership regardless of the requested role. Role changes
    /// must never happen through a silent upsert.
    async fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Membership, RepoError>;

    // --- Comments ---
    async fn add_comment(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError>;
    async fn get_comments(&self, project_id: Uuid) -> Vec<Comment>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const PROJECT_COLUMNS: &str = "id, owner_id, name, description, created_at";
const USER_COLUMNS: &str = "id, username, email, is_verified, verification_code";

/// PostgresRepository
///
/// The production implementation of the `Repository` trait, backed by a
/// PostgreSQL connection pool. Queries are runtime-checked (`query_as` with
/// explicit binds); uniqueness and referential integrity come from the
/// constraints in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps constraint violations onto the repository taxonomy: a unique-key hit
/// becomes the supplied conflict variant, a foreign-key hit means the
/// referenced row vanished (e.g., a role grant racing a project deletion).
fn map_constraint(err: sqlx::Error, conflict: RepoError) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
        _ => RepoError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {e:?}");
                None
            })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user_by_email error: {e:?}");
                None
            })
    }

    /// create_user
    ///
    /// Inserts an unverified user with a freshly generated verification code.
    /// The unique index on `users.email` turns a duplicate registration into
    /// `DuplicateUser`.
    async fn create_user(&self, username: String, email: String) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, is_verified, verification_code) \
             VALUES ($1, $2, $3, false, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, RepoError::DuplicateUser))
    }

    async fn mark_verified(&self, user_id: Uuid) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_verified = true WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)
    }

    /// create_project
    ///
    /// The two inserts (project, then owner membership) run in a single
    /// transaction; if the membership insert fails the project insert rolls
    /// back, so a half-created project is never visible.
    async fn create_project(
        &self,
        owner_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Project, RepoError> {
        let mut tx = self.pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (id, owner_id, name, description, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO project_members (user_id, project_id, role) VALUES ($1, $2, $3)")
            .bind(owner_id)
            .bind(project.id)
            .bind(Role::Owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, RepoError::DuplicateMembership))?;

        tx.commit().await?;
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepoError> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    /// update_project
    ///
    /// Uses COALESCE so only the fields provided in `req` change, mirroring
    /// the partial-update payload shape.
    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> Result<Project, RepoError> {
        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects \
             SET name = COALESCE($2, name), description = COALESCE($3, description) \
             WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)
    }

    /// delete_project
    ///
    /// Children before parent: comments, then memberships, then the project
    /// row. The transaction serializes against concurrent role grants, so no
    /// orphaned membership can survive the delete.
    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comments WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM project_members WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Nothing to delete; the implicit rollback undoes the child sweeps.
            return Err(RepoError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_projects_for_user(&self, user_id: Uuid) -> Vec<Project> {
        sqlx::query_as::<_, Project>(
            "SELECT p.id, p.owner_id, p.name, p.description, p.created_at \
             FROM projects p \
             JOIN project_members m ON m.project_id = p.id \
             WHERE m.user_id = $1 \
             ORDER BY p.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_projects_for_user error: {e:?}");
            vec![]
        })
    }

    async fn get_role(&self, user_id: Uuid, project_id: Uuid) -> Result<Option<Role>, RepoError> {
        let raw = sqlx::query_scalar::<_, String>(
            "SELECT role FROM project_members WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        match raw {
            None => Ok(None),
            // A value outside the CHECK constraint is corrupt data, which is
            // a store failure rather than "no membership".
            Some(raw) => Role::from_str(&raw)
                .map(Some)
                .map_err(|e| RepoError::Database(sqlx::Error::Decode(e.into()))),
        }
    }

    async fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Membership, RepoError> {
        sqlx::query("INSERT INTO project_members (user_id, project_id, role) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(project_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint(e, RepoError::DuplicateMembership))?;

        Ok(Membership {
            user_id,
            project_id,
            role,
        })
    }

    /// add_comment
    ///
    /// A CTE performs the insert and the author-email join in one query, so
    /// the returned comment is already enriched for the client.
    async fn add_comment(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        sqlx::query_as::<_, Comment>(
            "WITH inserted AS ( \
                 INSERT INTO comments (project_id, user_id, text, created_at, updated_at) \
                 VALUES ($1, $2, $3, NOW(), NOW()) \
                 RETURNING id, project_id, user_id, text, created_at, updated_at \
             ) \
             SELECT i.id, i.project_id, i.user_id, i.text, i.created_at, i.updated_at, \
                    u.email AS author_email \
             FROM inserted i JOIN users u ON i.user_id = u.id",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, RepoError::NotFound))
    }

    async fn get_comments(&self, project_id: Uuid) -> Vec<Comment> {
        sqlx::query_as::<_, Comment>(
            "SELECT c.id, c.project_id, c.user_id, c.text, c.created_at, c.updated_at, \
                    u.email AS author_email \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             WHERE c.project_id = $1 \
             ORDER BY c.created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
    }
}

// --- In-Memory Implementation (Tests and Local Experimentation) ---

#[derive(Default)]
struct MemoryStore {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    // Keyed by (user_id, project_id), mirroring the unique constraint.
    memberships: HashMap<(Uuid, Uuid), Role>,
    comments: Vec<Comment>,
    next_comment_id: i64,
}

/// MemoryRepository
///
/// An in-memory implementation of `Repository` used by the test suite and
/// for running the service without a database. A single mutex guards the
/// whole store, so the multi-row operations (project + owner membership,
/// ordered cascade delete) are atomic exactly as the contract demands.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.lock().users.get(&id).cloned()
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.lock().users.values().find(|u| u.email == email).cloned()
    }

    async fn create_user(&self, username: String, email: String) -> Result<User, RepoError> {
        let mut store = self.lock();
        if store.users.values().any(|u| u.email == email) {
            return Err(RepoError::DuplicateUser);
        }
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            is_verified: false,
            verification_code: Uuid::new_v4(),
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, user_id: Uuid) -> Result<User, RepoError> {
        let mut store = self.lock();
        let user = store.users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        user.is_verified = true;
        Ok(user.clone())
    }

    async fn create_project(
        &self,
        owner_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Project, RepoError> {
        let mut store = self.lock();
        let project = Project {
            id: Uuid::new_v4(),
            owner_id,
            name,
            description,
            created_at: Utc::now(),
        };
        // Both inserts happen under the same lock; no observer can see the
        // project without its owner membership.
        store.projects.insert(project.id, project.clone());
        store.memberships.insert((owner_id, project.id), Role::Owner);
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepoError> {
        Ok(self.lock().projects.get(&id).cloned())
    }

    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> Result<Project, RepoError> {
        let mut store = self.lock();
        let project = store.projects.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(name) = req.name {
            project.name = name;
        }
        if let Some(description) = req.description {
            project.description = Some(description);
        }
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.lock();
        if store.projects.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        store.comments.retain(|c| c.project_id != id);
        store.memberships.retain(|(_, project_id), _| *project_id != id);
        Ok(())
    }

    async fn get_projects_for_user(&self, user_id: Uuid) -> Vec<Project> {
        let store = self.lock();
        let mut projects: Vec<Project> = store
            .memberships
            .keys()
            .filter(|(member, _)| *member == user_id)
            .filter_map(|(_, project_id)| store.projects.get(project_id).cloned())
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    async fn get_role(&self, user_id: Uuid, project_id: Uuid) -> Result<Option<Role>, RepoError> {
        Ok(self.lock().memberships.get(&(user_id, project_id)).copied())
    }

    async fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Membership, RepoError> {
        let mut store = self.lock();
        if !store.projects.contains_key(&project_id) {
            return Err(RepoError::NotFound);
        }
        if store.memberships.contains_key(&(user_id, project_id)) {
            return Err(RepoError::DuplicateMembership);
        }
        store.memberships.insert((user_id, project_id), role);
        Ok(Membership {
            user_id,
            project_id,
            role,
        })
    }

    async fn add_comment(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        let mut store = self.lock();
        if !store.projects.contains_key(&project_id) {
            return Err(RepoError::NotFound);
        }
        let author_email = store.users.get(&user_id).map(|u| u.email.clone());
        store.next_comment_id += 1;
        let now = Utc::now();
        let comment = Comment {
            id: store.next_comment_id,
            project_id,
            user_id,
            text,
            created_at: now,
            updated_at: now,
            author_email,
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comments(&self, project_id: Uuid) -> Vec<Comment> {
        self.lock()
            .comments
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect()
    }
}
