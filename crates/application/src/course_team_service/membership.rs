use super::*;

use std::collections::BTreeSet;

use coursewright_domain::AuditAction;
use tracing::info;

use crate::AuditEvent;

impl CourseTeamService {
    /// Runs the checks a membership change passes before its requested role
    /// is read: caller access to the target, target lookup, and activation.
    pub async fn check_member_change(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        email: &str,
    ) -> AppResult<()> {
        self.require_target_access(actor, course, email).await?;
        let user = self.find_user(email).await?;
        require_active(&user)
    }

    /// Grants a course role to the user with `email`.
    ///
    /// Granting `Staff` to a current instructor downgrades them, which
    /// requires another instructor to remain.
    pub async fn grant(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        email: &str,
        role: CourseRole,
    ) -> AppResult<()> {
        let access = self.actor_access(actor, course).await?;
        if !access.can_manage() {
            let message = match role {
                CourseRole::Instructor => "only instructors may create other instructors",
                CourseRole::Staff => "insufficient permissions",
            };
            return Err(AppError::Forbidden(message.to_owned()));
        }

        let user = self.find_user(email).await?;
        require_active(&user)?;

        self.role_repository.ensure_course_roles(course).await?;
        let held = self
            .role_repository
            .roles_for_user(course, user.user_id)
            .await?;

        match role {
            CourseRole::Instructor => {
                if held.contains(&CourseRole::Instructor) {
                    return Ok(());
                }

                self.role_repository
                    .add_role(course, user.user_id, CourseRole::Instructor)
                    .await?;
                self.record_change(
                    actor,
                    course,
                    &user,
                    AuditAction::CourseRoleGranted,
                    format!("granted 'instructor' to '{}'", user.email),
                )
                .await
            }
            CourseRole::Staff if held.contains(&CourseRole::Instructor) => {
                self.remove_keeping_instructor(
                    course,
                    &user,
                    &BTreeSet::from([CourseRole::Instructor]),
                )
                .await?;
                if !held.contains(&CourseRole::Staff) {
                    self.role_repository
                        .add_role(course, user.user_id, CourseRole::Staff)
                        .await?;
                }
                self.record_change(
                    actor,
                    course,
                    &user,
                    AuditAction::CourseRoleDowngraded,
                    format!("downgraded '{}' from 'instructor' to 'staff'", user.email),
                )
                .await
            }
            CourseRole::Staff => {
                if held.contains(&CourseRole::Staff) {
                    return Ok(());
                }

                self.role_repository
                    .add_role(course, user.user_id, CourseRole::Staff)
                    .await?;
                self.record_change(
                    actor,
                    course,
                    &user,
                    AuditAction::CourseRoleGranted,
                    format!("granted 'staff' to '{}'", user.email),
                )
                .await
            }
        }
    }

    /// Removes every course role from the user with `email`.
    pub async fn revoke(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        email: &str,
    ) -> AppResult<()> {
        self.require_target_access(actor, course, email).await?;

        let user = self.find_user(email).await?;
        require_active(&user)?;

        self.role_repository.ensure_course_roles(course).await?;
        let held = self
            .role_repository
            .roles_for_user(course, user.user_id)
            .await?;
        if held.is_empty() {
            return Ok(());
        }

        self.remove_keeping_instructor(course, &user, &held).await?;

        let removed = held
            .iter()
            .map(CourseRole::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        self.record_change(
            actor,
            course,
            &user,
            AuditAction::CourseRoleRevoked,
            format!("removed '{removed}' from '{}'", user.email),
        )
        .await
    }

    async fn remove_keeping_instructor(
        &self,
        course: &CourseKey,
        user: &UserAccount,
        roles: &BTreeSet<CourseRole>,
    ) -> AppResult<()> {
        let removed = self
            .role_repository
            .remove_roles_keeping_instructor(course, user.user_id, roles)
            .await?;
        if removed {
            return Ok(());
        }

        Err(AppError::LastInstructor(
            "you may not remove the last instructor from a course".to_owned(),
        ))
    }

    async fn record_change(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        user: &UserAccount,
        action: AuditAction,
        detail: String,
    ) -> AppResult<()> {
        info!(
            actor = %actor.email(),
            course = %course,
            target = %user.email,
            action = action.as_str(),
            "course team changed"
        );

        self.audit_repository
            .append_event(AuditEvent {
                course: course.clone(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: "course_team_member".to_owned(),
                resource_id: user.user_id.to_string(),
                detail: Some(detail),
            })
            .await
    }
}

fn require_active(user: &UserAccount) -> AppResult<()> {
    if user.is_active {
        return Ok(());
    }

    Err(AppError::InactiveUser(format!(
        "user {} has registered but has not yet activated the account",
        user.email
    )))
}
