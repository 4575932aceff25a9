//! Fakes shared by application service tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use coursewright_core::{AppResult, UserIdentity};
use coursewright_domain::{CourseKey, CourseRole, EmailAddress, UserAccount, UserId};

use crate::{
    AuditEvent, AuditRepository, CourseAccessControl, CourseRoleRepository, UserDirectory,
};

#[derive(Default)]
pub(crate) struct FakeUserDirectory {
    pub(crate) users: Mutex<Vec<UserAccount>>,
}

#[async_trait]
impl UserDirectory for FakeUserDirectory {
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn list_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<UserAccount>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|user| user_ids.contains(&user.user_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeCourseRoleRepository {
    pub(crate) assignments: Mutex<HashMap<(CourseKey, UserId), BTreeSet<CourseRole>>>,
    pub(crate) ensured_courses: Mutex<Vec<CourseKey>>,
}

impl FakeCourseRoleRepository {
    pub(crate) async fn instructor_count(&self, course: &CourseKey) -> usize {
        self.assignments
            .lock()
            .await
            .iter()
            .filter(|((stored_course, _), roles)| {
                stored_course == course && roles.contains(&CourseRole::Instructor)
            })
            .count()
    }
}

#[async_trait]
impl CourseRoleRepository for FakeCourseRoleRepository {
    async fn ensure_course_roles(&self, course: &CourseKey) -> AppResult<()> {
        let mut ensured = self.ensured_courses.lock().await;
        if !ensured.contains(course) {
            ensured.push(course.clone());
        }
        Ok(())
    }

    async fn roles_for_user(
        &self,
        course: &CourseKey,
        user_id: UserId,
    ) -> AppResult<BTreeSet<CourseRole>> {
        Ok(self
            .assignments
            .lock()
            .await
            .get(&(course.clone(), user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_role(
        &self,
        course: &CourseKey,
        user_id: UserId,
        role: CourseRole,
    ) -> AppResult<()> {
        self.assignments
            .lock()
            .await
            .entry((course.clone(), user_id))
            .or_default()
            .insert(role);
        Ok(())
    }

    async fn remove_role(
        &self,
        course: &CourseKey,
        user_id: UserId,
        role: CourseRole,
    ) -> AppResult<()> {
        if let Some(roles) = self
            .assignments
            .lock()
            .await
            .get_mut(&(course.clone(), user_id))
        {
            roles.remove(&role);
        }
        Ok(())
    }

    async fn remove_roles_keeping_instructor(
        &self,
        course: &CourseKey,
        user_id: UserId,
        roles: &BTreeSet<CourseRole>,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.lock().await;
        if roles.contains(&CourseRole::Instructor) {
            let other_instructor = assignments.iter().any(|((stored_course, holder), held)| {
                stored_course == course
                    && *holder != user_id
                    && held.contains(&CourseRole::Instructor)
            });
            if !other_instructor {
                return Ok(false);
            }
        }

        if let Some(held) = assignments.get_mut(&(course.clone(), user_id)) {
            held.retain(|role| !roles.contains(role));
        }
        Ok(true)
    }

    async fn list_member_ids(
        &self,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<Vec<UserId>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter_map(|((stored_course, user_id), roles)| {
                (stored_course == course && roles.contains(&role)).then_some(*user_id)
            })
            .collect())
    }

    async fn list_courses(&self) -> AppResult<Vec<CourseKey>> {
        let mut courses = self.ensured_courses.lock().await.clone();
        courses.sort();
        Ok(courses)
    }
}

pub(crate) struct FakeAccessControl {
    pub(crate) users: Arc<FakeUserDirectory>,
    pub(crate) roles: Arc<FakeCourseRoleRepository>,
}

#[async_trait]
impl CourseAccessControl for FakeAccessControl {
    async fn has_access(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<bool> {
        let email = EmailAddress::new(actor.email())?;
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Ok(false);
        };
        if user.is_global_staff {
            return Ok(true);
        }

        let held = self.roles.roles_for_user(course, user.user_id).await?;
        Ok(held.iter().any(|held_role| held_role.includes(role)))
    }
}

#[derive(Default)]
pub(crate) struct RecordingAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for RecordingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) fn course_key() -> CourseKey {
    match CourseKey::new("MITx", "999", "Robot_Super_Course") {
        Ok(course) => course,
        Err(error) => panic!("invalid test course: {error}"),
    }
}

pub(crate) fn address(email: &str) -> EmailAddress {
    match EmailAddress::new(email) {
        Ok(address) => address,
        Err(error) => panic!("invalid test email: {error}"),
    }
}
