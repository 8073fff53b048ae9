use crate::models::Role;
use serde::{Deserialize, Serialize};

/// Action
///
/// Every project-scoped operation the system exposes. Handlers never reason
/// about roles directly; they name the action and let [`authorize`] decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read the project or anything under it (details, comment listing).
    View,
    /// Change the project's name or description.
    Edit,
    /// Remove the project and everything under it.
    Delete,
    /// Grant a role on the project to another principal.
    ManageMembers,
    /// Post a comment under the project.
    Comment,
}

/// Decision
///
/// The outcome of an authorization check. "Project does not exist" is a
/// separate condition the caller resolves *before* asking for a decision,
/// so the engine itself is total and never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// authorize
///
/// The single source of truth for role-based access. Centralizing the table
/// here replaces the per-handler inline checks that previously let individual
/// endpoints drift (comment listing had no membership check at all).
///
/// | action         | owner | editor | reader |
/// |----------------|-------|--------|--------|
/// | view           |   ✓   |   ✓    |   ✓    |
/// | edit           |   ✓   |   ✓    |   ✗    |
/// | delete         |   ✓   |   ✗    |   ✗    |
/// | manage_members |   ✓   |   ✗    |   ✗    |
/// | comment        |   ✓   |   ✓    |   ✗    |
///
/// No membership (`role == None`) denies every action; there are no public
/// projects. `Delete` and `ManageMembers` are both owner-only today but are
/// deliberately distinct rows: a future policy widening member management
/// must not implicitly widen deletion.
pub fn authorize(role: Option<Role>, action: Action) -> Decision {
    let Some(role) = role else {
        return Decision::Deny;
    };

    let allowed = match action {
        Action::View => true,
        Action::Edit | Action::Comment => matches!(role, Role::Owner | Role::Editor),
        Action::Delete | Action::ManageMembers => matches!(role, Role::Owner),
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}
