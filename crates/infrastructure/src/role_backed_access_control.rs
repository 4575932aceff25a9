use std::sync::Arc;

use async_trait::async_trait;
use coursewright_application::{CourseAccessControl, CourseRoleRepository, UserDirectory};
use coursewright_core::{AppResult, UserIdentity};
use coursewright_domain::{CourseKey, CourseRole, EmailAddress};
use tracing::debug;

/// Access control derived from stored course roles.
///
/// Global staff accounts pass every check; otherwise any held role that
/// includes the requested one grants access.
#[derive(Clone)]
pub struct RoleBackedAccessControl {
    user_directory: Arc<dyn UserDirectory>,
    role_repository: Arc<dyn CourseRoleRepository>,
}

impl RoleBackedAccessControl {
    /// Creates the access control from its lookups.
    #[must_use]
    pub fn new(
        user_directory: Arc<dyn UserDirectory>,
        role_repository: Arc<dyn CourseRoleRepository>,
    ) -> Self {
        Self {
            user_directory,
            role_repository,
        }
    }
}

#[async_trait]
impl CourseAccessControl for RoleBackedAccessControl {
    async fn has_access(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<bool> {
        let Ok(email) = EmailAddress::new(actor.email()) else {
            return Ok(false);
        };
        let Some(user) = self.user_directory.find_user_by_email(&email).await? else {
            return Ok(false);
        };

        if user.is_global_staff {
            return Ok(true);
        }

        let held = self
            .role_repository
            .roles_for_user(course, user.user_id)
            .await?;
        let granted = held.iter().any(|held_role| held_role.includes(role));

        debug!(
            actor = %email,
            location = %course.location(),
            role = role.as_str(),
            granted,
            "course access checked"
        );

        Ok(granted)
    }
}
