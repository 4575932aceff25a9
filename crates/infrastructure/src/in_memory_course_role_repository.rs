use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use coursewright_application::CourseRoleRepository;
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, CourseRole, UserId};
use tokio::sync::RwLock;

/// In-memory course role storage keyed by `(course, user)`.
#[derive(Debug, Default)]
pub struct InMemoryCourseRoleRepository {
    courses: RwLock<HashSet<CourseKey>>,
    assignments: RwLock<HashMap<(CourseKey, UserId), BTreeSet<CourseRole>>>,
}

impl InMemoryCourseRoleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn require_course(&self, course: &CourseKey) -> AppResult<()> {
        if self.courses.read().await.contains(course) {
            return Ok(());
        }

        Err(AppError::Internal(format!(
            "role storage for course '{course}' has not been created"
        )))
    }
}

#[async_trait]
impl CourseRoleRepository for InMemoryCourseRoleRepository {
    async fn ensure_course_roles(&self, course: &CourseKey) -> AppResult<()> {
        let mut courses = self.courses.write().await;
        if !courses.contains(course) {
            courses.insert(course.clone());
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
            .read()
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
        self.require_course(course).await?;
        self.assignments
            .write()
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
        let key = (course.clone(), user_id);
        let mut assignments = self.assignments.write().await;
        if let Some(roles) = assignments.get_mut(&key) {
            roles.remove(&role);
            if roles.is_empty() {
                assignments.remove(&key);
            }
        }
        Ok(())
    }

    async fn remove_roles_keeping_instructor(
        &self,
        course: &CourseKey,
        user_id: UserId,
        roles: &BTreeSet<CourseRole>,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.write().await;
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

        let key = (course.clone(), user_id);
        if let Some(held) = assignments.get_mut(&key) {
            held.retain(|role| !roles.contains(role));
            if held.is_empty() {
                assignments.remove(&key);
            }
        }
        Ok(true)
    }

    async fn list_member_ids(
        &self,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<Vec<UserId>> {
        let assignments = self.assignments.read().await;
        let mut members: Vec<UserId> = assignments
            .iter()
            .filter_map(|((stored_course, user_id), roles)| {
                (stored_course == course && roles.contains(&role)).then_some(*user_id)
            })
            .collect();
        members.sort();
        Ok(members)
    }

    async fn list_courses(&self) -> AppResult<Vec<CourseKey>> {
        let mut courses: Vec<CourseKey> = self.courses.read().await.iter().cloned().collect();
        courses.sort();
        Ok(courses)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use coursewright_application::CourseRoleRepository;
    use coursewright_domain::{CourseKey, CourseRole, UserId};

    use super::InMemoryCourseRoleRepository;

    fn course() -> CourseKey {
        match CourseKey::new("MITx", "999", "Robot_Super_Course") {
            Ok(course) => course,
            Err(error) => panic!("invalid test course: {error}"),
        }
    }

    #[tokio::test]
    async fn add_role_requires_lazily_created_course() {
        let repository = InMemoryCourseRoleRepository::new();
        let user_id = UserId::new();

        let before = repository
            .add_role(&course(), user_id, CourseRole::Staff)
            .await;
        assert!(before.is_err());

        assert!(repository.ensure_course_roles(&course()).await.is_ok());
        assert!(repository.ensure_course_roles(&course()).await.is_ok());
        let after = repository
            .add_role(&course(), user_id, CourseRole::Staff)
            .await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn roles_are_independent_memberships() {
        let repository = InMemoryCourseRoleRepository::new();
        let user_id = UserId::new();
        assert!(repository.ensure_course_roles(&course()).await.is_ok());

        for role in CourseRole::PRIORITY {
            assert!(repository.add_role(&course(), user_id, role).await.is_ok());
        }
        assert!(
            repository
                .remove_role(&course(), user_id, CourseRole::Instructor)
                .await
                .is_ok()
        );

        let held = repository
            .roles_for_user(&course(), user_id)
            .await
            .unwrap_or_default();
        assert_eq!(held.into_iter().collect::<Vec<_>>(), vec![CourseRole::Staff]);

        let instructors = repository
            .list_member_ids(&course(), CourseRole::Instructor)
            .await
            .unwrap_or_default();
        assert!(instructors.is_empty());
        let staff = repository
            .list_member_ids(&course(), CourseRole::Staff)
            .await
            .unwrap_or_default();
        assert_eq!(staff, vec![user_id]);
    }

    #[tokio::test]
    async fn last_instructor_removal_is_refused_without_changes() {
        let repository = InMemoryCourseRoleRepository::new();
        let user_id = UserId::new();
        assert!(repository.ensure_course_roles(&course()).await.is_ok());
        for role in CourseRole::PRIORITY {
            assert!(repository.add_role(&course(), user_id, role).await.is_ok());
        }

        let removed = repository
            .remove_roles_keeping_instructor(
                &course(),
                user_id,
                &BTreeSet::from(CourseRole::PRIORITY),
            )
            .await;

        assert_eq!(removed.ok(), Some(false));
        let held = repository
            .roles_for_user(&course(), user_id)
            .await
            .unwrap_or_default();
        assert_eq!(held.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_instructor_removals_leave_one_instructor() {
        for _ in 0..50 {
            let repository = Arc::new(InMemoryCourseRoleRepository::new());
            let first = UserId::new();
            let second = UserId::new();
            assert!(repository.ensure_course_roles(&course()).await.is_ok());
            for user_id in [first, second] {
                let added = repository
                    .add_role(&course(), user_id, CourseRole::Instructor)
                    .await;
                assert!(added.is_ok());
            }

            let removals = [first, second].map(|user_id| {
                let repository = repository.clone();
                tokio::spawn(async move {
                    repository
                        .remove_roles_keeping_instructor(
                            &course(),
                            user_id,
                            &BTreeSet::from([CourseRole::Instructor]),
                        )
                        .await
                })
            });

            let mut removed = 0;
            for removal in removals {
                if let Ok(Ok(true)) = removal.await {
                    removed += 1;
                }
            }
            assert_eq!(removed, 1);

            let instructors = repository
                .list_member_ids(&course(), CourseRole::Instructor)
                .await
                .unwrap_or_default();
            assert_eq!(instructors.len(), 1);
        }
    }

    #[tokio::test]
    async fn lists_created_courses_in_key_order() {
        let repository = InMemoryCourseRoleRepository::new();
        let other = match CourseKey::new("HarvardX", "CS50", "2026") {
            Ok(course) => course,
            Err(error) => panic!("invalid test course: {error}"),
        };
        assert!(repository.ensure_course_roles(&course()).await.is_ok());
        assert!(repository.ensure_course_roles(&other).await.is_ok());

        let courses = repository.list_courses().await.unwrap_or_default();
        assert_eq!(courses, vec![other, course()]);
    }
}
