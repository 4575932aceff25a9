//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_email_transport;
mod in_memory_course_role_repository;
mod in_memory_email_outcome_ledger;
mod in_memory_user_directory;
mod postgres_audit_repository;
mod postgres_course_role_repository;
mod postgres_email_outcome_ledger;
mod postgres_user_directory;
mod role_backed_access_control;
mod smtp_email_transport;
mod tokio_email_job_queue;
mod tracing_audit_repository;

pub use console_email_transport::ConsoleEmailTransport;
pub use in_memory_course_role_repository::InMemoryCourseRoleRepository;
pub use in_memory_email_outcome_ledger::InMemoryEmailOutcomeLedger;
pub use in_memory_user_directory::InMemoryUserDirectory;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_course_role_repository::PostgresCourseRoleRepository;
pub use postgres_email_outcome_ledger::PostgresEmailOutcomeLedger;
pub use postgres_user_directory::PostgresUserDirectory;
pub use role_backed_access_control::RoleBackedAccessControl;
pub use smtp_email_transport::{SmtpEmailConfig, SmtpEmailTransport};
pub use tokio_email_job_queue::{EmailJobReceiver, TokioEmailJobQueue, TokioRetryScheduler};
pub use tracing_audit_repository::TracingAuditRepository;
