use std::collections::HashSet;
use std::sync::Arc;

use coursewright_core::{AppError, AppResult, UserIdentity};
use coursewright_domain::{
    AuditAction, CourseKey, CourseRole, EmailAddress, EmailSendJob, EmailSendJobInput,
    EmailTarget,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, CourseEnrollmentDirectory, CourseTeamService, EmailJobQueue,
    EmailOutcomeLedger, RecordedEmailOutcome, SendCourseEmailInput,
};

#[cfg(test)]
mod tests;

/// Application service accepting course emails from the course team.
#[derive(Clone)]
pub struct BulkEmailService {
    course_team_service: CourseTeamService,
    enrollment_directory: Arc<dyn CourseEnrollmentDirectory>,
    job_queue: Arc<dyn EmailJobQueue>,
    outcome_ledger: Arc<dyn EmailOutcomeLedger>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl BulkEmailService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        course_team_service: CourseTeamService,
        enrollment_directory: Arc<dyn CourseEnrollmentDirectory>,
        job_queue: Arc<dyn EmailJobQueue>,
        outcome_ledger: Arc<dyn EmailOutcomeLedger>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            course_team_service,
            enrollment_directory,
            job_queue,
            outcome_ledger,
            audit_repository,
        }
    }

    /// Resolves recipients, queues the job, and returns it.
    pub async fn submit(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        input: SendCourseEmailInput,
    ) -> AppResult<EmailSendJob> {
        self.require_course_team(actor, course).await?;

        let sender = EmailAddress::new(actor.email())?;
        let recipients = self
            .resolve_recipients(course, &sender, input.target)
            .await?;
        let job = EmailSendJob::new(EmailSendJobInput {
            course: course.clone(),
            sender,
            target: input.target,
            subject: input.subject,
            body: input.message,
            recipients,
        })?;

        self.job_queue.enqueue(job.clone()).await?;

        info!(
            job_id = %job.job_id(),
            course = %course,
            target = job.target().as_str(),
            recipients = job.recipients().len(),
            "course email queued"
        );

        self.audit_repository
            .append_event(AuditEvent {
                course: course.clone(),
                subject: actor.subject().to_owned(),
                action: AuditAction::CourseEmailQueued,
                resource_type: "course_email_job".to_owned(),
                resource_id: job.job_id().to_string(),
                detail: Some(format!(
                    "queued '{}' to {} recipient(s)",
                    job.target().as_str(),
                    job.recipients().len()
                )),
            })
            .await?;

        Ok(job)
    }

    /// Returns the reported outcome of a finished job in the course.
    pub async fn job_outcome(
        &self,
        actor: &UserIdentity,
        course: &CourseKey,
        job_id: Uuid,
    ) -> AppResult<RecordedEmailOutcome> {
        self.require_course_team(actor, course).await?;

        self.outcome_ledger
            .find_outcome(job_id)
            .await?
            .filter(|recorded| &recorded.course == course)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no finished email job '{job_id}' in course '{course}'"
                ))
            })
    }

    async fn require_course_team(&self, actor: &UserIdentity, course: &CourseKey) -> AppResult<()> {
        let access = self.course_team_service.actor_access(actor, course).await?;
        if access.can_view() {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "'{}' may not send email for course '{course}'",
            actor.email()
        )))
    }

    async fn resolve_recipients(
        &self,
        course: &CourseKey,
        sender: &EmailAddress,
        target: EmailTarget,
    ) -> AppResult<Vec<EmailAddress>> {
        if target == EmailTarget::Myself {
            return Ok(vec![sender.clone()]);
        }

        let mut recipients = Vec::new();
        for role in CourseRole::PRIORITY {
            let members = self.course_team_service.list_members(course, role).await?;
            recipients.extend(
                members
                    .into_iter()
                    .filter(|member| member.is_active)
                    .map(|member| member.email),
            );
        }

        if target == EmailTarget::All {
            recipients.extend(
                self.enrollment_directory
                    .list_enrolled_learners(course)
                    .await?,
            );
        }

        let mut seen = HashSet::new();
        recipients.retain(|recipient| seen.insert(recipient.clone()));
        Ok(recipients)
    }
}
