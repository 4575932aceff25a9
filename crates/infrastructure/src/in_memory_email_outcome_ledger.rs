use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use coursewright_application::{EmailOutcomeLedger, EmailResultReporter, RecordedEmailOutcome};
use coursewright_core::AppResult;
use coursewright_domain::{EmailSendJob, EmailSendOutcome};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// In-memory record of finished email jobs.
#[derive(Debug, Default)]
pub struct InMemoryEmailOutcomeLedger {
    outcomes: RwLock<HashMap<Uuid, RecordedEmailOutcome>>,
}

impl InMemoryEmailOutcomeLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailResultReporter for InMemoryEmailOutcomeLedger {
    async fn report_outcome(
        &self,
        job: &EmailSendJob,
        outcome: EmailSendOutcome,
    ) -> AppResult<()> {
        info!(
            job_id = %job.job_id(),
            course = %job.course(),
            sent = outcome.sent,
            failed = outcome.failed,
            "course email outcome recorded"
        );

        self.outcomes.write().await.insert(
            job.job_id(),
            RecordedEmailOutcome {
                job_id: job.job_id(),
                course: job.course().clone(),
                outcome,
                retries: job.attempt(),
                finished_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl EmailOutcomeLedger for InMemoryEmailOutcomeLedger {
    async fn find_outcome(&self, job_id: Uuid) -> AppResult<Option<RecordedEmailOutcome>> {
        Ok(self.outcomes.read().await.get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use coursewright_application::{EmailOutcomeLedger, EmailResultReporter};
    use coursewright_domain::{
        CourseKey, EmailAddress, EmailSendJob, EmailSendJobInput, EmailSendOutcome, EmailTarget,
    };

    use super::InMemoryEmailOutcomeLedger;

    #[tokio::test]
    async fn reported_outcomes_are_found_by_job_id() {
        let Ok(course) = CourseKey::new("MITx", "999", "Robot_Super_Course") else {
            panic!("invalid test course");
        };
        let Ok(sender) = EmailAddress::new("instructor@example.org") else {
            panic!("invalid test email");
        };
        let Ok(job) = EmailSendJob::new(EmailSendJobInput {
            course,
            sender: sender.clone(),
            target: EmailTarget::Myself,
            subject: "Subject".to_owned(),
            body: "Body".to_owned(),
            recipients: vec![sender],
        }) else {
            panic!("invalid test job");
        };
        let job = job.next_attempt();
        let ledger = InMemoryEmailOutcomeLedger::new();
        let outcome = EmailSendOutcome { sent: 1, failed: 0 };

        assert!(ledger.report_outcome(&job, outcome).await.is_ok());

        let recorded = ledger.find_outcome(job.job_id()).await.ok().flatten();
        let Some(recorded) = recorded else {
            panic!("outcome should be recorded");
        };
        assert_eq!(recorded.outcome, outcome);
        assert_eq!(recorded.retries, 1);
        assert_eq!(recorded.course, *job.course());
    }
}
