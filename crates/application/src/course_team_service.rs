use std::sync::Arc;

use coursewright_core::{AppError, AppResult, UserIdentity};
use coursewright_domain::{CourseKey, CourseRole, EmailAddress, UserAccount};
use tracing::debug;

use crate::{
    AccessibleCourses, AuditRepository, CourseAccess, CourseAccessControl, CourseRoleRepository,
    CourseTeamMember, CourseTeamRoster, UserDirectory,
};

mod membership;


/// Application service managing instructor and staff membership of courses.
#[derive(Clone)]
pub struct CourseTeamService {
    access_control: Arc<dyn CourseAccessControl>,
    user_directory: Arc<dyn UserDirectory>,
    role_repository: Arc<dyn CourseRoleRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    course_creation_disabled: bool,
}

// Legacy placeholder course kept out of every listing.
const TEMPLATES_COURSE: &str = "templates";

impl CourseTeamService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        access_control: Arc<dyn CourseAccessControl>,
        user_directory: Arc<dyn UserDirectory>,
        role_repository: Arc<dyn CourseRoleRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            access_control,
            user_directory,
            role_repository,
            audit_repository,
            course_creation_disabled: false,
        }
    }

    /// Bars callers without global staff from creating courses.
    #[must_use]
    pub fn with_course_creation_disabled(mut self, disabled: bool) -> Self {
        self.course_creation_disabled = disabled;
        self
    }

    /// Lists the courses the caller has staff or instructor access to.
    pub async fn list_accessible_courses(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<AccessibleCourses> {
        let mut courses = Vec::new();
        for course in self.role_repository.list_courses().await? {
            if course.course() == TEMPLATES_COURSE {
                continue;
            }
            if self
                .access_control
                .has_access(actor, &course, CourseRole::Staff)
                .await?
            {
                courses.push(course);
            }
        }

        let is_global_staff = match EmailAddress::new(actor.email()) {
            Ok(email) => self
                .user_directory
                .find_user_by_email(&email)
                .await?
                .is_some_and(|user| user.is_global_staff),
            Err(_) => false,
        };

        Ok(AccessibleCourses {
            courses,
            disable_course_creation: self.course_creation_disabled && !is_global_staff,
        })
    }

    /// Returns the highest role the user holds in the course.
    pub async fn get_role(
        &self,
        course: &CourseKey,
        user: &UserAccount,
    ) -> AppResult<Option<CourseRole>> {
        self.role_repository.ensure_course_roles(course).await?;
        let held = self
            .role_repository
            .roles_for_user(course, user.user_id)
            .await?;

        Ok(CourseRole::highest(&held))
    }

    /// Lists users holding the role in the course, ordered by email.
    pub async fn list_members(
        &self,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<Vec<UserAccount>> {
        self.role_repository.ensure_course_roles(course).await?;
        let member_ids = self.role_repository.list_member_ids(course, role).await?;
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut members = self.user_directory.list_users_by_ids(&member_ids).await?;
        members.sort_by(|left, right| left.email.cmp(&right.email));
        Ok(members)
    }

    /// Resolves the caller's effective access to the course.
    pub async fn actor_access(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
    ) -> AppResult<CourseAccess> {
        let instructor = self
            .access_control
            .has_access(actor, course, CourseRole::Instructor)
            .await?;
        let staff = instructor
            || self
                .access_control
                .has_access(actor, course, CourseRole::Staff)
                .await?;

        Ok(CourseAccess { instructor, staff })
    }

    /// Returns the course team for callers with staff or instructor access.
    pub async fn team_roster(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
    ) -> AppResult<CourseTeamRoster> {
        let access = self.actor_access(actor, course).await?;
        if !access.can_view() {
            return Err(AppError::Forbidden(format!(
                "'{}' has no access to course '{course}'",
                actor.email()
            )));
        }

        Ok(CourseTeamRoster {
            instructors: self.list_members(course, CourseRole::Instructor).await?,
            staff: self.list_members(course, CourseRole::Staff).await?,
            can_manage: access.can_manage(),
        })
    }

    /// Returns email, activation state, and highest role for one user.
    ///
    /// Instructors may read anyone; staff may only read themselves.
    pub async fn describe_member(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        email: &str,
    ) -> AppResult<CourseTeamMember> {
        self.require_target_access(actor, course, email).await?;

        let user = self.find_user(email).await?;
        let role = self.get_role(course, &user).await?;

        Ok(CourseTeamMember {
            email: user.email,
            active: user.is_active,
            role,
        })
    }

    /// Checks the caller may act on `email`: instructors on anyone, staff on
    /// themselves.
    async fn require_target_access(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        email: &str,
    ) -> AppResult<CourseAccess> {
        let access = self.actor_access(actor, course).await?;
        if access.instructor || (access.staff && refers_to_actor(actor, email)) {
            return Ok(access);
        }

        debug!(
            actor = %actor.email(),
            course = %course,
            target = %email,
            "course team access denied"
        );
        Err(AppError::Forbidden("insufficient permissions".to_owned()))
    }

    async fn find_user(&self, email: &str) -> AppResult<UserAccount> {
        let not_found = || {
            AppError::NotFound(format!(
                "could not find user by email address '{}'",
                email.trim()
            ))
        };

        let Ok(address) = EmailAddress::new(email) else {
            return Err(not_found());
        };

        self.user_directory
            .find_user_by_email(&address)
            .await?
            .ok_or_else(not_found)
    }
}

fn refers_to_actor(actor: &UserIdentity, email: &str) -> bool {
    match (EmailAddress::new(actor.email()), EmailAddress::new(email)) {
        (Ok(actor_email), Ok(target)) => actor_email == target,
        _ => false,
    }
}
