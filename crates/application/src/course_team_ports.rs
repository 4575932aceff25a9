use std::collections::BTreeSet;

use async_trait::async_trait;
use coursewright_core::{AppResult, UserIdentity};
use coursewright_domain::{CourseKey, CourseRole, EmailAddress, UserAccount, UserId};

/// Capability check deciding whether a caller holds a course role.
///
/// Implementations own the role hierarchy: asking for `Staff` succeeds for
/// instructors too.
#[async_trait]
pub trait CourseAccessControl: Send + Sync {
    /// Returns whether the actor has the role's capabilities in the course.
    async fn has_access(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<bool>;
}

/// Read port over platform user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds one account by its login email.
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserAccount>>;

    /// Loads the accounts for the given identifiers, skipping unknown ones.
    async fn list_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<UserAccount>>;
}

/// Storage port mapping `(course, user)` to the set of held role tags.
#[async_trait]
pub trait CourseRoleRepository: Send + Sync {
    /// Creates role storage for the course if it does not exist yet.
    async fn ensure_course_roles(&self, course: &CourseKey) -> AppResult<()>;

    /// Returns every role the user holds in the course.
    async fn roles_for_user(
        &self,
        course: &CourseKey,
        user_id: UserId,
    ) -> AppResult<BTreeSet<CourseRole>>;

    /// Adds one role membership. Adding a held role is a no-op.
    async fn add_role(&self, course: &CourseKey, user_id: UserId, role: CourseRole)
    -> AppResult<()>;

    /// Removes one role membership. Removing a missing role is a no-op.
    async fn remove_role(
        &self,
        course: &CourseKey,
        user_id: UserId,
        role: CourseRole,
    ) -> AppResult<()>;

    /// Removes the listed roles from the user in one atomic step.
    ///
    /// When `roles` contains `Instructor` and no other instructor would
    /// remain, nothing is removed and `false` is returned. Concurrent calls
    /// for the same course are serialized by the storage.
    async fn remove_roles_keeping_instructor(
        &self,
        course: &CourseKey,
        user_id: UserId,
        roles: &BTreeSet<CourseRole>,
    ) -> AppResult<bool>;

    /// Lists users holding the role in the course.
    async fn list_member_ids(&self, course: &CourseKey, role: CourseRole)
    -> AppResult<Vec<UserId>>;

    /// Lists every course with role storage, ordered by key.
    async fn list_courses(&self) -> AppResult<Vec<CourseKey>>;
}

/// Effective access of one caller within one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CourseAccess {
    /// Caller has instructor capabilities.
    pub instructor: bool,
    /// Caller has staff capabilities.
    pub staff: bool,
}

impl CourseAccess {
    /// Returns whether the caller may read course-team data.
    #[must_use]
    pub fn can_view(&self) -> bool {
        self.instructor || self.staff
    }

    /// Returns whether the caller may change course-team membership.
    #[must_use]
    pub fn can_manage(&self) -> bool {
        self.instructor
    }
}

/// Course-team view of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseTeamMember {
    /// Login email.
    pub email: EmailAddress,
    /// Whether the account has been activated.
    pub active: bool,
    /// Highest role held in the course.
    pub role: Option<CourseRole>,
}

/// Course-team listing for administrative views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseTeamRoster {
    /// Users holding the instructor role.
    pub instructors: Vec<UserAccount>,
    /// Users holding the staff role.
    pub staff: Vec<UserAccount>,
    /// Whether the caller may change membership.
    pub can_manage: bool,
}

/// Courses visible to one caller on the course listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibleCourses {
    /// Courses the caller holds staff or instructor access to.
    pub courses: Vec<CourseKey>,
    /// Whether the caller is barred from creating new courses.
    pub disable_course_creation: bool,
}
