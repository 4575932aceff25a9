use std::sync::Arc;

use coursewright_application::{
    AuditRepository, CourseEnrollmentDirectory, CourseRoleRepository, EmailOutcomeLedger,
    EmailResultReporter, UserDirectory,
};
use coursewright_infrastructure::{
    InMemoryCourseRoleRepository, InMemoryEmailOutcomeLedger, InMemoryUserDirectory,
    PostgresAuditRepository, PostgresCourseRoleRepository, PostgresEmailOutcomeLedger,
    PostgresUserDirectory, TracingAuditRepository,
};
use sqlx::PgPool;

/// Where course teams, users, and email outcomes are kept.
#[derive(Clone)]
pub enum StorageBackend {
    InMemory(InMemoryStorage),
    Postgres(PgPool),
}

/// Process-local stores used when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    pub users: Arc<InMemoryUserDirectory>,
    pub roles: Arc<InMemoryCourseRoleRepository>,
    pub outcomes: Arc<InMemoryEmailOutcomeLedger>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(super) struct RepositorySet {
    pub(super) user_directory: Arc<dyn UserDirectory>,
    pub(super) enrollment_directory: Arc<dyn CourseEnrollmentDirectory>,
    pub(super) role_repository: Arc<dyn CourseRoleRepository>,
    pub(super) audit_repository: Arc<dyn AuditRepository>,
    pub(super) outcome_ledger: Arc<dyn EmailOutcomeLedger>,
    pub(super) result_reporter: Arc<dyn EmailResultReporter>,
}

pub(super) fn build_repository_set(storage: &StorageBackend) -> RepositorySet {
    match storage {
        StorageBackend::InMemory(storage) => RepositorySet {
            user_directory: storage.users.clone(),
            enrollment_directory: storage.users.clone(),
            role_repository: storage.roles.clone(),
            audit_repository: Arc::new(TracingAuditRepository::new()),
            outcome_ledger: storage.outcomes.clone(),
            result_reporter: storage.outcomes.clone(),
        },
        StorageBackend::Postgres(pool) => {
            let user_directory = Arc::new(PostgresUserDirectory::new(pool.clone()));
            let outcome_ledger = Arc::new(PostgresEmailOutcomeLedger::new(pool.clone()));
            RepositorySet {
                user_directory: user_directory.clone(),
                enrollment_directory: user_directory,
                role_repository: Arc::new(PostgresCourseRoleRepository::new(pool.clone())),
                audit_repository: Arc::new(PostgresAuditRepository::new(pool.clone())),
                outcome_ledger: outcome_ledger.clone(),
                result_reporter: outcome_ledger,
            }
        }
    }
}
