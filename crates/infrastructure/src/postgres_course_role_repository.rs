use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use coursewright_application::CourseRoleRepository;
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, CourseRole, UserId};

/// PostgreSQL-backed course role storage.
#[derive(Clone)]
pub struct PostgresCourseRoleRepository {
    pool: PgPool,
}

impl PostgresCourseRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CourseTeamRow {
    org: String,
    course: String,
    run: String,
}

#[async_trait]
impl CourseRoleRepository for PostgresCourseRoleRepository {
    async fn ensure_course_roles(&self, course: &CourseKey) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO course_teams (org, course, run)
            VALUES ($1, $2, $3)
            ON CONFLICT (org, course, run) DO NOTHING
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to create role storage for course '{course}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn roles_for_user(
        &self,
        course: &CourseKey,
        user_id: UserId,
    ) -> AppResult<BTreeSet<CourseRole>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT role
            FROM course_role_assignments
            WHERE org = $1 AND course = $2 AND run = $3 AND user_id = $4
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load course roles: {error}")))?;

        rows.iter()
            .map(|value| CourseRole::from_str(value.as_str()))
            .collect()
    }

    async fn add_role(
        &self,
        course: &CourseKey,
        user_id: UserId,
        role: CourseRole,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO course_role_assignments (org, course, run, user_id, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (org, course, run, user_id, role) DO NOTHING
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to add role '{role}' in course '{course}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn remove_role(
        &self,
        course: &CourseKey,
        user_id: UserId,
        role: CourseRole,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM course_role_assignments
            WHERE org = $1 AND course = $2 AND run = $3 AND user_id = $4 AND role = $5
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to remove role '{role}' in course '{course}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn remove_roles_keeping_instructor(
        &self,
        course: &CourseKey,
        user_id: UserId,
        roles: &BTreeSet<CourseRole>,
    ) -> AppResult<bool> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start role removal transaction for course '{course}': {error}"
            ))
        })?;

        sqlx::query(
            r#"
            SELECT 1
            FROM course_teams
            WHERE org = $1 AND course = $2 AND run = $3
            FOR UPDATE
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock course team '{course}': {error}"))
        })?;

        if roles.contains(&CourseRole::Instructor) {
            let other_instructors = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM course_role_assignments
                WHERE org = $1 AND course = $2 AND run = $3
                  AND role = $4 AND user_id <> $5
                "#,
            )
            .bind(course.org())
            .bind(course.course())
            .bind(course.run())
            .bind(CourseRole::Instructor.as_str())
            .bind(user_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count course instructors: {error}"))
            })?;

            if other_instructors == 0 {
                transaction.rollback().await.map_err(|error| {
                    AppError::Internal(format!(
                        "failed to roll back role removal for course '{course}': {error}"
                    ))
                })?;
                return Ok(false);
            }
        }

        let role_names: Vec<String> = roles.iter().map(|role| role.as_str().to_owned()).collect();
        sqlx::query(
            r#"
            DELETE FROM course_role_assignments
            WHERE org = $1 AND course = $2 AND run = $3 AND user_id = $4 AND role = ANY($5)
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(user_id.as_uuid())
        .bind(role_names)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to remove roles in course '{course}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit role removal for course '{course}': {error}"
            ))
        })?;

        Ok(true)
    }

    async fn list_member_ids(
        &self,
        course: &CourseKey,
        role: CourseRole,
    ) -> AppResult<Vec<UserId>> {
        let rows = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT user_id
            FROM course_role_assignments
            WHERE org = $1 AND course = $2 AND run = $3 AND role = $4
            ORDER BY user_id
            "#,
        )
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list course members: {error}")))?;

        Ok(rows.into_iter().map(UserId::from_uuid).collect())
    }

    async fn list_courses(&self) -> AppResult<Vec<CourseKey>> {
        let rows = sqlx::query_as::<_, CourseTeamRow>(
            r#"
            SELECT org, course, run
            FROM course_teams
            ORDER BY org, course, run
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list courses: {error}")))?;

        rows.into_iter()
            .map(|row| CourseKey::new(row.org, row.course, row.run))
            .collect()
    }
}
