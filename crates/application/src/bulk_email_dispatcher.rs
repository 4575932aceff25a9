use std::sync::Arc;

use coursewright_core::AppResult;
use coursewright_domain::{
    EmailJobStatus, EmailSendJob, EmailSendOutcome, FailureClass, SendFailure, classify,
};
use tracing::{info, warn};

use crate::{EmailResultReporter, EmailTransport, OutgoingEmail, RetryPolicy, RetryScheduler};


/// Summary of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDispatchReport {
    /// Terminal status of the attempt.
    pub status: EmailJobStatus,
    /// Recipients handled before the attempt ended.
    pub processed_recipients: u32,
    /// Reported tally; absent when the job was rescheduled.
    pub outcome: Option<EmailSendOutcome>,
}

/// Runs email jobs over a transport and routes failures by classification.
#[derive(Clone)]
pub struct BulkEmailDispatcher {
    transport: Arc<dyn EmailTransport>,
    retry_scheduler: Arc<dyn RetryScheduler>,
    result_reporter: Arc<dyn EmailResultReporter>,
    retry_policy: RetryPolicy,
}

impl BulkEmailDispatcher {
    /// Creates a new dispatcher from required dependencies.
    #[must_use]
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        retry_scheduler: Arc<dyn RetryScheduler>,
        result_reporter: Arc<dyn EmailResultReporter>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            retry_scheduler,
            result_reporter,
            retry_policy,
        }
    }

    /// Sends one job to its recipients in order.
    ///
    /// A transient failure hands the job back to the retry scheduler and
    /// reports nothing; permanent failures are tallied and sending continues.
    pub async fn process(&self, mut job: EmailSendJob) -> AppResult<EmailDispatchReport> {
        job.transition_to(EmailJobStatus::Sending)?;

        let mut connection = match self.transport.connect().await {
            Ok(connection) => connection,
            Err(failure) => return self.reschedule(job, failure, 0).await,
        };

        let mut outcome = EmailSendOutcome::default();
        let mut processed = 0_u32;
        let mut transient_failure = None;
        for recipient in job.recipients() {
            let email = OutgoingEmail {
                from: job.sender(),
                to: recipient,
                subject: job.subject(),
                body: job.body(),
            };

            match connection.send(email).await {
                Ok(()) => outcome.sent = outcome.sent.saturating_add(1),
                Err(failure) => match classify(&failure) {
                    FailureClass::Transient => {
                        transient_failure = Some(failure);
                        break;
                    }
                    FailureClass::Permanent => {
                        warn!(
                            job_id = %job.job_id(),
                            recipient = %recipient,
                            error = %failure,
                            "course email recipient rejected permanently"
                        );
                        outcome.failed = outcome.failed.saturating_add(1);
                    }
                },
            }
            processed = processed.saturating_add(1);
        }
        drop(connection);

        if let Some(failure) = transient_failure {
            return self.reschedule(job, failure, processed).await;
        }

        let status = outcome.status();
        job.transition_to(status)?;
        self.result_reporter.report_outcome(&job, outcome).await?;

        info!(
            job_id = %job.job_id(),
            course = %job.course(),
            sent = outcome.sent,
            failed = outcome.failed,
            status = status.as_str(),
            "course email job finished"
        );

        Ok(EmailDispatchReport {
            status,
            processed_recipients: processed,
            outcome: Some(outcome),
        })
    }

    async fn reschedule(
        &self,
        mut job: EmailSendJob,
        failure: SendFailure,
        processed: u32,
    ) -> AppResult<EmailDispatchReport> {
        job.transition_to(EmailJobStatus::RetryScheduled)?;
        let countdown = self.retry_policy.countdown_for(job.attempt());

        warn!(
            job_id = %job.job_id(),
            course = %job.course(),
            attempt = job.attempt(),
            countdown_secs = countdown.as_secs(),
            error = %failure,
            "course email job hit a transient failure; scheduling retry"
        );

        self.retry_scheduler
            .retry(job.next_attempt(), failure, countdown)
            .await?;

        Ok(EmailDispatchReport {
            status: EmailJobStatus::RetryScheduled,
            processed_recipients: processed,
            outcome: None,
        })
    }
}
