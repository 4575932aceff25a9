use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a course role is added to a user.
    CourseRoleGranted,
    /// Emitted when an instructor is moved down to staff.
    CourseRoleDowngraded,
    /// Emitted when every course role is removed from a user.
    CourseRoleRevoked,
    /// Emitted when a bulk course email is queued.
    CourseEmailQueued,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseRoleGranted => "course_role.granted",
            Self::CourseRoleDowngraded => "course_role.downgraded",
            Self::CourseRoleRevoked => "course_role.revoked",
            Self::CourseEmailQueued => "course_email.queued",
        }
    }
}
