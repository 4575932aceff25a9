//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod bulk_email_dispatcher;
mod bulk_email_ports;
mod bulk_email_service;
mod course_team_ports;
mod course_team_service;

#[cfg(test)]
mod test_support;

pub use audit_ports::{AuditEvent, AuditRepository};
pub use bulk_email_dispatcher::{BulkEmailDispatcher, EmailDispatchReport};
pub use bulk_email_ports::{
    CourseEnrollmentDirectory, EmailConnection, EmailJobQueue, EmailOutcomeLedger,
    EmailResultReporter, EmailTransport, OutgoingEmail, RecordedEmailOutcome, RetryPolicy,
    RetryScheduler, SendCourseEmailInput,
};
pub use bulk_email_service::BulkEmailService;
pub use course_team_ports::{
    AccessibleCourses, CourseAccess, CourseAccessControl, CourseRoleRepository, CourseTeamMember,
    CourseTeamRoster, UserDirectory,
};
pub use course_team_service::CourseTeamService;
