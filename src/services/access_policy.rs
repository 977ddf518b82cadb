use crate::db::types::UserRole;

/// Actions guarded by role. Ownership checks (own course, own report) happen on top of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    ManageUsers,
    CreateCourse,
    DeleteCourse,
    ManageOwnCourses,
    ManageAnyCourse,
    SubmitAnswers,
    ViewAnswerKey,
    ViewAnyReport,
}

/// Accounts stored without a role predate role assignment and are treated as students.
pub(crate) fn effective_role(stored: Option<UserRole>) -> UserRole {
    stored.unwrap_or(UserRole::Student)
}

pub(crate) fn role_allows(role: UserRole, capability: Capability) -> bool {
    use Capability::*;

    match role {
        UserRole::Admin => !matches!(capability, SubmitAnswers),
        UserRole::Teacher => {
            matches!(capability, CreateCourse | ManageOwnCourses | ViewAnswerKey)
        }
        UserRole::Student => matches!(capability, SubmitAnswers),
    }
}
