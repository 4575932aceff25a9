use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use coursewright_application::{CourseEnrollmentDirectory, UserDirectory};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, EmailAddress, UserAccount, UserId};
use tokio::sync::RwLock;

/// In-memory user accounts and course enrollments.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserAccount>>,
    enrollments: RwLock<HashMap<CourseKey, HashSet<UserId>>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an account, rejecting duplicate emails.
    pub async fn insert_user(&self, account: UserAccount) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.email == account.email && existing.user_id != account.user_id)
        {
            return Err(AppError::Validation(format!(
                "user with email '{}' already exists",
                account.email
            )));
        }

        users.insert(account.user_id, account);
        Ok(())
    }

    /// Enrolls a known user as a learner in the course.
    pub async fn enroll(&self, course: &CourseKey, user_id: UserId) -> AppResult<()> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }

        self.enrollments
            .write()
            .await
            .entry(course.clone())
            .or_default()
            .insert(user_id);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn list_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<UserAccount>> {
        let users = self.users.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|user_id| users.get(user_id).cloned())
            .collect())
    }
}

#[async_trait]
impl CourseEnrollmentDirectory for InMemoryUserDirectory {
    async fn list_enrolled_learners(&self, course: &CourseKey) -> AppResult<Vec<EmailAddress>> {
        let enrollments = self.enrollments.read().await;
        let Some(enrolled) = enrollments.get(course) else {
            return Ok(Vec::new());
        };

        let users = self.users.read().await;
        let mut learners: Vec<EmailAddress> = enrolled
            .iter()
            .filter_map(|user_id| users.get(user_id))
            .filter(|user| user.is_active)
            .map(|user| user.email.clone())
            .collect();
        learners.sort();
        Ok(learners)
    }
}
