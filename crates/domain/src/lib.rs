//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod bulk_email;
mod course;
mod role;
mod security;
mod user;

pub use bulk_email::{
    EmailJobStatus, EmailSendJob, EmailSendJobInput, EmailSendOutcome, EmailTarget, FailureClass,
    SendFailure, SmtpReplyCode, classify,
};
pub use course::CourseKey;
pub use role::CourseRole;
pub use security::AuditAction;
pub use user::{EmailAddress, UserAccount, UserId};
