use std::time::Duration;

use async_trait::async_trait;
use coursewright_application::{BulkEmailDispatcher, EmailJobQueue, RetryScheduler};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{EmailSendJob, SendFailure};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// In-process email job queue backed by an unbounded Tokio channel.
#[derive(Clone)]
pub struct TokioEmailJobQueue {
    sender: mpsc::UnboundedSender<EmailSendJob>,
}

/// Consumer side of [`TokioEmailJobQueue`].
pub struct EmailJobReceiver {
    receiver: mpsc::UnboundedReceiver<EmailSendJob>,
}

impl TokioEmailJobQueue {
    /// Creates the queue and its receiving half.
    #[must_use]
    pub fn new() -> (Self, EmailJobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, EmailJobReceiver { receiver })
    }

    /// Returns a retry scheduler feeding this queue.
    #[must_use]
    pub fn retry_scheduler(&self, max_retries: u32) -> TokioRetryScheduler {
        TokioRetryScheduler {
            sender: self.sender.clone(),
            max_retries,
        }
    }
}

#[async_trait]
impl EmailJobQueue for TokioEmailJobQueue {
    async fn enqueue(&self, job: EmailSendJob) -> AppResult<()> {
        self.sender
            .send(job)
            .map_err(|_| AppError::Internal("email job queue is closed".to_owned()))
    }
}

/// Retry scheduler that re-enqueues jobs after their countdown elapses.
///
/// Jobs whose attempt counter exceeds `max_retries` are dropped with an
/// error log.
#[derive(Clone)]
pub struct TokioRetryScheduler {
    sender: mpsc::UnboundedSender<EmailSendJob>,
    max_retries: u32,
}

#[async_trait]
impl RetryScheduler for TokioRetryScheduler {
    async fn retry(
        &self,
        job: EmailSendJob,
        failure: SendFailure,
        countdown: Duration,
    ) -> AppResult<()> {
        if job.attempt() > self.max_retries {
            error!(
                job_id = %job.job_id(),
                attempt = job.attempt(),
                max_retries = self.max_retries,
                error = %failure,
                "course email job exhausted its retries"
            );
            return Ok(());
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(countdown).await;
            let job_id = job.job_id();
            if sender.send(job).is_err() {
                warn!(%job_id, "email job queue closed before retry");
            }
        });

        Ok(())
    }
}

impl EmailJobReceiver {
    /// Receives the next queued job, if the queue is still open.
    pub async fn recv(&mut self) -> Option<EmailSendJob> {
        self.receiver.recv().await
    }

    /// Dispatches queued jobs until every sender is dropped.
    pub async fn run(mut self, dispatcher: BulkEmailDispatcher) {
        info!("course email worker started");

        while let Some(job) = self.recv().await {
            let job_id = job.job_id();
            match dispatcher.process(job).await {
                Ok(report) => info!(
                    %job_id,
                    status = report.status.as_str(),
                    processed = report.processed_recipients,
                    "course email attempt finished"
                ),
                Err(error) => error!(%job_id, %error, "course email attempt failed"),
            }
        }

        info!("course email worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use coursewright_application::{EmailJobQueue, RetryScheduler};
    use coursewright_domain::{
        CourseKey, EmailAddress, EmailSendJob, EmailSendJobInput, EmailTarget, SendFailure,
    };

    use super::TokioEmailJobQueue;

    fn job() -> EmailSendJob {
        let Ok(course) = CourseKey::new("MITx", "999", "Robot_Super_Course") else {
            panic!("invalid test course");
        };
        let Ok(sender) = EmailAddress::new("instructor@example.org") else {
            panic!("invalid test email");
        };
        let built = EmailSendJob::new(EmailSendJobInput {
            course,
            sender: sender.clone(),
            target: EmailTarget::Myself,
            subject: "Subject".to_owned(),
            body: "Body".to_owned(),
            recipients: vec![sender],
        });
        let Ok(job) = built else {
            panic!("invalid test job");
        };
        job
    }

    fn failure() -> SendFailure {
        SendFailure::Disconnected {
            reason: "connection reset".to_owned(),
        }
    }

    #[tokio::test]
    async fn enqueued_jobs_reach_the_receiver() {
        let (queue, mut receiver) = TokioEmailJobQueue::new();
        let job = job();
        let job_id = job.job_id();

        assert!(queue.enqueue(job).await.is_ok());
        assert_eq!(receiver.recv().await.map(|job| job.job_id()), Some(job_id));
    }

    #[tokio::test]
    async fn retries_are_requeued_after_countdown() {
        let (queue, mut receiver) = TokioEmailJobQueue::new();
        let scheduler = queue.retry_scheduler(5);
        let retried = job().next_attempt();

        let scheduled = scheduler
            .retry(retried, failure(), Duration::ZERO)
            .await;
        assert!(scheduled.is_ok());

        let received = receiver.recv().await;
        assert_eq!(received.map(|job| job.attempt()), Some(1));
    }

    #[tokio::test]
    async fn retries_beyond_the_limit_are_dropped() {
        let (queue, mut receiver) = TokioEmailJobQueue::new();
        let scheduler = queue.retry_scheduler(1);
        let exhausted = job().next_attempt().next_attempt();

        assert!(
            scheduler
                .retry(exhausted, failure(), Duration::ZERO)
                .await
                .is_ok()
        );
        drop(scheduler);
        drop(queue);

        assert!(receiver.recv().await.is_none());
    }
}
