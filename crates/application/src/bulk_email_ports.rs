use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursewright_core::AppResult;
use coursewright_domain::{
    CourseKey, EmailAddress, EmailSendJob, EmailSendOutcome, EmailTarget, SendFailure,
};
use uuid::Uuid;

/// One rendered message addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail<'a> {
    /// Sender address.
    pub from: &'a EmailAddress,
    /// Recipient address.
    pub to: &'a EmailAddress,
    /// Subject line.
    pub subject: &'a str,
    /// Plain-text body.
    pub body: &'a str,
}

/// Mail transport able to open a sending session.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Establishes a session with the mail server.
    async fn connect(&self) -> Result<Box<dyn EmailConnection>, SendFailure>;
}

/// Open session with the mail server.
#[async_trait]
pub trait EmailConnection: Send {
    /// Sends one message over the session.
    async fn send(&mut self, email: OutgoingEmail<'_>) -> Result<(), SendFailure>;
}

/// Task-queue hook for re-running a job later.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Schedules `job` to run again after `countdown`, carrying the failure
    /// that triggered the retry.
    async fn retry(
        &self,
        job: EmailSendJob,
        failure: SendFailure,
        countdown: Duration,
    ) -> AppResult<()>;
}

/// Result callback invoked once per job that finished without a transient error.
#[async_trait]
pub trait EmailResultReporter: Send + Sync {
    /// Reports the final sent/failed tally.
    async fn report_outcome(&self, job: &EmailSendJob, outcome: EmailSendOutcome)
    -> AppResult<()>;
}

/// Queue accepting freshly submitted jobs.
#[async_trait]
pub trait EmailJobQueue: Send + Sync {
    /// Enqueues a pending job.
    async fn enqueue(&self, job: EmailSendJob) -> AppResult<()>;
}

/// Outcome recorded for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmailOutcome {
    /// Job identifier.
    pub job_id: Uuid,
    /// Owning course.
    pub course: CourseKey,
    /// Final tally.
    pub outcome: EmailSendOutcome,
    /// Attempts that preceded the finishing one.
    pub retries: u32,
    /// Time the outcome was reported.
    pub finished_at: DateTime<Utc>,
}

/// Read port over reported job outcomes.
#[async_trait]
pub trait EmailOutcomeLedger: Send + Sync {
    /// Finds the outcome of one job.
    async fn find_outcome(&self, job_id: Uuid) -> AppResult<Option<RecordedEmailOutcome>>;
}

/// Directory of learners enrolled in a course.
#[async_trait]
pub trait CourseEnrollmentDirectory: Send + Sync {
    /// Lists emails of active learners enrolled in the course.
    async fn list_enrolled_learners(&self, course: &CourseKey) -> AppResult<Vec<EmailAddress>>;
}

/// Input payload for submitting a course email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCourseEmailInput {
    /// Audience selector.
    pub target: EmailTarget,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub message: String,
}

/// Exponential backoff used when a transient failure reschedules a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Countdown before the first retry.
    pub base_countdown: Duration,
    /// Upper bound for any countdown.
    pub max_countdown: Duration,
}

impl RetryPolicy {
    /// Returns the countdown before retrying a job that already ran
    /// `attempt` times unsuccessfully.
    #[must_use]
    pub fn countdown_for(&self, attempt: u32) -> Duration {
        self.base_countdown
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_countdown)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_countdown: Duration::from_secs(60),
            max_countdown: Duration::from_secs(15 * 60),
        }
    }
}
