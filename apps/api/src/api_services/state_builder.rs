use std::sync::Arc;

use coursewright_application::{BulkEmailDispatcher, BulkEmailService, CourseTeamService};
use coursewright_core::AppError;
use coursewright_infrastructure::{EmailJobReceiver, RoleBackedAccessControl, TokioEmailJobQueue};
use tokio::task::JoinHandle;
use tracing::info;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::database::connect_and_migrate;
use super::email::build_email_transport;

mod repositories;

pub use repositories::{InMemoryStorage, StorageBackend};

/// Request state plus the background email worker that serves it.
pub struct ApiRuntime {
    pub state: AppState,
    pub email_worker: EmailWorker,
}

/// Consumer of queued course emails, not yet running.
pub struct EmailWorker {
    receiver: EmailJobReceiver,
    dispatcher: BulkEmailDispatcher,
}

impl EmailWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.receiver.run(self.dispatcher))
    }
}

pub async fn connect_storage(config: &ApiConfig) -> Result<StorageBackend, AppError> {
    match config.database_url.as_deref() {
        Some(database_url) => Ok(StorageBackend::Postgres(
            connect_and_migrate(database_url).await?,
        )),
        None if config.migrate_only => Err(AppError::Validation(
            "DATABASE_URL is required to run migrations".to_owned(),
        )),
        None => {
            info!("DATABASE_URL is not set, using in-memory storage");
            Ok(StorageBackend::InMemory(InMemoryStorage::new()))
        }
    }
}

pub fn build_api_runtime(
    storage: &StorageBackend,
    config: &ApiConfig,
) -> Result<ApiRuntime, AppError> {
    let repositories = repositories::build_repository_set(storage);

    let access_control = Arc::new(RoleBackedAccessControl::new(
        repositories.user_directory.clone(),
        repositories.role_repository.clone(),
    ));
    let course_team_service = CourseTeamService::new(
        access_control,
        repositories.user_directory.clone(),
        repositories.role_repository,
        repositories.audit_repository.clone(),
    )
    .with_course_creation_disabled(config.disable_course_creation);

    let (job_queue, receiver) = TokioEmailJobQueue::new();
    let retry_scheduler = Arc::new(job_queue.retry_scheduler(config.bulk_email.max_retries));
    let dispatcher = BulkEmailDispatcher::new(
        build_email_transport(config)?,
        retry_scheduler,
        repositories.result_reporter,
        config.bulk_email.retry_policy,
    );

    let bulk_email_service = BulkEmailService::new(
        course_team_service.clone(),
        repositories.enrollment_directory,
        Arc::new(job_queue),
        repositories.outcome_ledger,
        repositories.audit_repository,
    );

    Ok(ApiRuntime {
        state: AppState {
            course_team_service,
            bulk_email_service,
            user_directory: repositories.user_directory,
        },
        email_worker: EmailWorker {
            receiver,
            dispatcher,
        },
    })
}
