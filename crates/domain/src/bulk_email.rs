//! Bulk course email values: send failures, their classification, and the
//! per-job state machine.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use coursewright_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{CourseKey, EmailAddress};

/// Three-digit SMTP reply code carried by a server rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SmtpReplyCode(u16);

impl SmtpReplyCode {
    /// `553`: requested action not taken, mailbox name not allowed.
    pub const MAILBOX_NAME_NOT_ALLOWED: Self = Self(553);

    /// Creates a validated reply code in the `200..=599` range.
    pub fn new(value: u16) -> AppResult<Self> {
        if !(200..=599).contains(&value) {
            return Err(AppError::Validation(format!(
                "SMTP reply code {value} must be between 200 and 599"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the numeric code.
    #[must_use]
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Returns whether the server signalled a temporary (4xx) condition.
    #[must_use]
    pub fn is_transient_negative(&self) -> bool {
        (400..500).contains(&self.0)
    }
}

impl FromStr for SmtpReplyCode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value.trim();
        if digits.len() != 3 {
            return Err(AppError::Validation(format!(
                "SMTP reply code '{digits}' must have three digits"
            )));
        }

        let code = digits.parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid SMTP reply code '{digits}': {error}"))
        })?;
        Self::new(code)
    }
}

impl std::fmt::Display for SmtpReplyCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Failure raised while delivering one course email.
///
/// Built once by the transport adapter; downstream code only inspects the
/// variant and reply code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    /// The transport could not be established.
    #[error("could not connect to mail server: {reason}")]
    Connect {
        /// Transport detail.
        reason: String,
    },

    /// The server dropped the connection mid-send.
    #[error("mail server disconnected: {reason}")]
    Disconnected {
        /// Transport detail.
        reason: String,
    },

    /// The server rejected the message with a reply code.
    #[error("mail server rejected message ({code}): {message}")]
    Rejected {
        /// Reply code returned by the server.
        code: SmtpReplyCode,
        /// Server reply text.
        message: String,
    },
}

/// Outcome of classifying a [`SendFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Retry the whole job later.
    Transient,
    /// Skip the recipient, count it failed, keep sending.
    Permanent,
}

/// Classifies a send failure as transient or permanent.
#[must_use]
pub fn classify(failure: &SendFailure) -> FailureClass {
    match failure {
        SendFailure::Connect { .. } | SendFailure::Disconnected { .. } => FailureClass::Transient,
        SendFailure::Rejected { code, .. } if code.is_transient_negative() => {
            FailureClass::Transient
        }
        SendFailure::Rejected { .. } => FailureClass::Permanent,
    }
}

/// Audience selector for a course email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTarget {
    /// Only the sender.
    Myself,
    /// Instructors and staff of the course.
    Staff,
    /// Course team plus every enrolled learner.
    All,
}

impl EmailTarget {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Myself => "myself",
            Self::Staff => "staff",
            Self::All => "all",
        }
    }
}

impl FromStr for EmailTarget {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "myself" => Ok(Self::Myself),
            "staff" => Ok(Self::Staff),
            "all" => Ok(Self::All),
            other => Err(AppError::Validation(format!(
                "unknown email target '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of one email send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailJobStatus {
    /// Queued, not yet picked up.
    Pending,
    /// Iterating recipients.
    Sending,
    /// Every recipient accepted.
    Succeeded,
    /// Finished with at least one permanently failed recipient.
    PartialFailure,
    /// Handed back to the scheduler after a transient failure.
    RetryScheduled,
}

impl EmailJobStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Succeeded => "succeeded",
            Self::PartialFailure => "partial_failure",
            Self::RetryScheduled => "retry_scheduled",
        }
    }

    /// Returns whether the status ends the current attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PartialFailure | Self::RetryScheduled
        )
    }

    /// Returns whether moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sending)
                | (
                    Self::Sending,
                    Self::Succeeded | Self::PartialFailure | Self::RetryScheduled
                )
        )
    }
}

/// Sent/failed tally reported when a job finishes without a transient error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSendOutcome {
    /// Recipients accepted by the server.
    pub sent: u32,
    /// Recipients permanently rejected.
    pub failed: u32,
}

impl EmailSendOutcome {
    /// Returns the terminal status matching this tally.
    #[must_use]
    pub fn status(&self) -> EmailJobStatus {
        if self.failed == 0 {
            EmailJobStatus::Succeeded
        } else {
            EmailJobStatus::PartialFailure
        }
    }
}

/// Input payload for creating email jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSendJobInput {
    /// Course the email belongs to.
    pub course: CourseKey,
    /// Sender address.
    pub sender: EmailAddress,
    /// Audience the recipients were resolved from.
    pub target: EmailTarget,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Resolved recipient addresses.
    pub recipients: Vec<EmailAddress>,
}

/// One course email addressed to a resolved recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSendJob {
    job_id: Uuid,
    course: CourseKey,
    sender: EmailAddress,
    target: EmailTarget,
    subject: NonEmptyString,
    body: NonEmptyString,
    recipients: Vec<EmailAddress>,
    attempt: u32,
    status: EmailJobStatus,
    created_at: DateTime<Utc>,
}

impl EmailSendJob {
    /// Creates a pending job after validating its content.
    pub fn new(input: EmailSendJobInput) -> AppResult<Self> {
        let subject = NonEmptyString::new(input.subject)
            .map_err(|_| AppError::Validation("email subject must not be empty".to_owned()))?;
        let body = NonEmptyString::new(input.body)
            .map_err(|_| AppError::Validation("email message must not be empty".to_owned()))?;

        if input.recipients.is_empty() {
            return Err(AppError::Validation(format!(
                "email target '{}' resolved to no recipients in course '{}'",
                input.target.as_str(),
                input.course
            )));
        }

        Ok(Self {
            job_id: Uuid::new_v4(),
            course: input.course,
            sender: input.sender,
            target: input.target,
            subject,
            body,
            recipients: input.recipients,
            attempt: 0,
            status: EmailJobStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Returns the stable job identifier.
    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Returns the owning course.
    #[must_use]
    pub fn course(&self) -> &CourseKey {
        &self.course
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> &EmailAddress {
        &self.sender
    }

    /// Returns the audience selector.
    #[must_use]
    pub fn target(&self) -> EmailTarget {
        self.target
    }

    /// Returns the subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the plain-text body.
    #[must_use]
    pub fn body(&self) -> &str {
        self.body.as_str()
    }

    /// Returns recipients in send order.
    #[must_use]
    pub fn recipients(&self) -> &[EmailAddress] {
        &self.recipients
    }

    /// Returns how many retries preceded this attempt.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> EmailJobStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Moves the job to `next`, rejecting illegal transitions.
    pub fn transition_to(&mut self, next: EmailJobStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "email job '{}' cannot move from '{}' to '{}'",
                self.job_id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        Ok(())
    }

    /// Returns a fresh pending copy for the next retry attempt.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            status: EmailJobStatus::Pending,
            ..self.clone()
        }
    }
}
