use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use coursewright_application::{CourseEnrollmentDirectory, UserDirectory};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, EmailAddress, UserAccount, UserId};

/// PostgreSQL-backed user accounts and enrollments.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    is_active: bool,
    is_global_staff: bool,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::from_uuid(row.id),
            email: EmailAddress::new(row.email)?,
            is_active: row.is_active,
            is_global_staff: row.is_global_staff,
        })
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, is_active, is_global_staff
            FROM users
            WHERE lower(email) = $1
            LIMIT 1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by email: {error}")))?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn list_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<UserAccount>> {
        let ids: Vec<uuid::Uuid> = user_ids.iter().map(UserId::as_uuid).collect();
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, is_active, is_global_staff
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list users: {error}")))?;

        rows.into_iter().map(UserAccount::try_from).collect()
    }
}

#[async_trait]
impl CourseEnrollmentDirectory for PostgresUserDirectory {
    async fn list_enrolled_learners(&self, course: &CourseKey) -> AppResult<Vec<EmailAddress>> {
        let emails = sqlx::query_scalar::<_, String>(
            r#"
            SELECT users.email
            FROM course_enrollments AS enrollments
            INNER JOIN users
                ON users.id = enrollments.user_id
            WHERE enrollments.org = $1
                AND enrollments.course = $2
                AND enrollments.run = $3
                AND users.is_active
            ORDER BY users.email
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list enrolled learners: {error}"))
        })?;

        emails.into_iter().map(EmailAddress::new).collect()
    }
}
