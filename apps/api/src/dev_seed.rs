use std::sync::Arc;

use coursewright_application::{CourseRoleRepository, UserDirectory};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, CourseRole, EmailAddress, UserAccount, UserId};
use coursewright_infrastructure::{PostgresCourseRoleRepository, PostgresUserDirectory};
use sqlx::PgPool;
use tracing::info;

use crate::api_services::{InMemoryStorage, StorageBackend};

const DEV_SEED_INSTRUCTOR_EMAIL: &str = "instructor@coursewright.local";
const DEV_SEED_STAFF_EMAIL: &str = "staff@coursewright.local";
const DEV_SEED_LEARNER_EMAIL: &str = "learner@coursewright.local";
const DEV_SEED_PENDING_EMAIL: &str = "pending@coursewright.local";

struct SeedUser {
    email: &'static str,
    is_active: bool,
    role: Option<CourseRole>,
    enrolled: bool,
}

const SEED_USERS: [SeedUser; 4] = [
    SeedUser {
        email: DEV_SEED_INSTRUCTOR_EMAIL,
        is_active: true,
        role: Some(CourseRole::Instructor),
        enrolled: false,
    },
    SeedUser {
        email: DEV_SEED_STAFF_EMAIL,
        is_active: true,
        role: Some(CourseRole::Staff),
        enrolled: false,
    },
    SeedUser {
        email: DEV_SEED_LEARNER_EMAIL,
        is_active: true,
        role: None,
        enrolled: true,
    },
    SeedUser {
        email: DEV_SEED_PENDING_EMAIL,
        is_active: false,
        role: None,
        enrolled: true,
    },
];

/// Seeds a course with one instructor, one staff member, and two learners.
pub async fn run(storage: &StorageBackend, course: &CourseKey) -> AppResult<()> {
    let role_repository: Arc<dyn CourseRoleRepository> = match storage {
        StorageBackend::InMemory(storage) => storage.roles.clone(),
        StorageBackend::Postgres(pool) => Arc::new(PostgresCourseRoleRepository::new(pool.clone())),
    };
    role_repository.ensure_course_roles(course).await?;

    for seed in &SEED_USERS {
        let email = EmailAddress::new(seed.email)?;
        let account = match storage {
            StorageBackend::InMemory(storage) => {
                ensure_in_memory_user(storage, email, seed.is_active).await?
            }
            StorageBackend::Postgres(pool) => {
                ensure_postgres_user(pool, email, seed.is_active).await?
            }
        };

        if let Some(role) = seed.role {
            role_repository
                .add_role(course, account.user_id, role)
                .await?;
        }

        if seed.enrolled {
            match storage {
                StorageBackend::InMemory(storage) => {
                    storage.users.enroll(course, account.user_id).await?;
                }
                StorageBackend::Postgres(pool) => {
                    ensure_postgres_enrollment(pool, course, account.user_id).await?;
                }
            }
        }
    }

    info!(
        course = %course,
        instructor = DEV_SEED_INSTRUCTOR_EMAIL,
        staff = DEV_SEED_STAFF_EMAIL,
        "development course team seeded"
    );

    Ok(())
}

async fn ensure_in_memory_user(
    storage: &InMemoryStorage,
    email: EmailAddress,
    is_active: bool,
) -> AppResult<UserAccount> {
    if let Some(existing) = storage.users.find_user_by_email(&email).await? {
        return Ok(existing);
    }

    let account = UserAccount {
        user_id: UserId::new(),
        email,
        is_active,
        is_global_staff: false,
    };
    storage.users.insert_user(account.clone()).await?;
    Ok(account)
}

async fn ensure_postgres_user(
    pool: &PgPool,
    email: EmailAddress,
    is_active: bool,
) -> AppResult<UserAccount> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, is_active)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(UserId::new().as_uuid())
    .bind(email.as_str())
    .bind(is_active)
    .execute(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to seed user '{email}': {error}")))?;

    PostgresUserDirectory::new(pool.clone())
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Internal(format!("seeded user '{email}' was not stored")))
}

async fn ensure_postgres_enrollment(
    pool: &PgPool,
    course: &CourseKey,
    user_id: UserId,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO course_enrollments (org, course, run, user_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (org, course, run, user_id) DO NOTHING
        "#,
    )
    .bind(course.org())
    .bind(course.course())
    .bind(course.run())
    .bind(user_id.as_uuid())
    .execute(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to seed enrollment: {error}")))?;

    Ok(())
}
