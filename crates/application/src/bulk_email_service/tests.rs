use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use coursewright_core::{AppError, AppResult, UserIdentity};
use coursewright_domain::{
    AuditAction, CourseKey, CourseRole, EmailAddress, EmailJobStatus, EmailSendJob,
    EmailSendOutcome, EmailTarget, UserAccount,
};

use crate::test_support::{
    FakeAccessControl, FakeCourseRoleRepository, FakeUserDirectory, RecordingAuditRepository,
    address, course_key,
};
use crate::{
    CourseEnrollmentDirectory, CourseRoleRepository, CourseTeamService, EmailJobQueue,
    EmailOutcomeLedger, RecordedEmailOutcome, SendCourseEmailInput,
};

use super::BulkEmailService;

#[derive(Default)]
struct FakeEnrollmentDirectory {
    learners: Vec<EmailAddress>,
}

#[async_trait]
impl CourseEnrollmentDirectory for FakeEnrollmentDirectory {
    async fn list_enrolled_learners(&self, _course: &CourseKey) -> AppResult<Vec<EmailAddress>> {
        Ok(self.learners.clone())
    }
}

#[derive(Default)]
struct RecordingJobQueue {
    jobs: Mutex<Vec<EmailSendJob>>,
}

#[async_trait]
impl EmailJobQueue for RecordingJobQueue {
    async fn enqueue(&self, job: EmailSendJob) -> AppResult<()> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

#[derive(Default)]
struct FakeOutcomeLedger {
    outcomes: Mutex<HashMap<Uuid, RecordedEmailOutcome>>,
}

#[async_trait]
impl EmailOutcomeLedger for FakeOutcomeLedger {
    async fn find_outcome(&self, job_id: Uuid) -> AppResult<Option<RecordedEmailOutcome>> {
        Ok(self.outcomes.lock().await.get(&job_id).cloned())
    }
}

struct Harness {
    service: BulkEmailService,
    users: Arc<FakeUserDirectory>,
    roles: Arc<FakeCourseRoleRepository>,
    queue: Arc<RecordingJobQueue>,
    ledger: Arc<FakeOutcomeLedger>,
    audit: Arc<RecordingAuditRepository>,
    course: CourseKey,
}

impl Harness {
    fn new(learners: &[&str]) -> Self {
        let users = Arc::new(FakeUserDirectory::default());
        let roles = Arc::new(FakeCourseRoleRepository::default());
        let audit = Arc::new(RecordingAuditRepository::default());
        let queue = Arc::new(RecordingJobQueue::default());
        let ledger = Arc::new(FakeOutcomeLedger::default());
        let course_team_service = CourseTeamService::new(
            Arc::new(FakeAccessControl {
                users: users.clone(),
                roles: roles.clone(),
            }),
            users.clone(),
            roles.clone(),
            audit.clone(),
        );
        let enrollments = Arc::new(FakeEnrollmentDirectory {
            learners: learners.iter().map(|email| address(email)).collect(),
        });

        Self {
            service: BulkEmailService::new(
                course_team_service,
                enrollments,
                queue.clone(),
                ledger.clone(),
                audit.clone(),
            ),
            users,
            roles,
            queue,
            ledger,
            audit,
            course: course_key(),
        }
    }

    async fn add_member(&self, email: &str, role: CourseRole, is_active: bool) -> UserIdentity {
        let mut account = UserAccount::active(address(email));
        account.is_active = is_active;
        self.users.users.lock().await.push(account.clone());
        let added = self
            .roles
            .add_role(&self.course, account.user_id, role)
            .await;
        assert!(added.is_ok());
        UserIdentity::new(account.user_id.to_string(), email, email)
    }
}

fn request(target: EmailTarget) -> SendCourseEmailInput {
    SendCourseEmailInput {
        target,
        subject: "test subject".to_owned(),
        message: "test message".to_owned(),
    }
}

fn recipient_emails(job: &EmailSendJob) -> Vec<&str> {
    job.recipients().iter().map(EmailAddress::as_str).collect()
}

#[tokio::test]
async fn myself_target_sends_only_to_sender() {
    let harness = Harness::new(&["learner@example.org"]);
    let instructor = harness
        .add_member("instructor@example.org", CourseRole::Instructor, true)
        .await;

    let Ok(job) = harness
        .service
        .submit(&instructor, &harness.course, request(EmailTarget::Myself))
        .await
    else {
        panic!("submission should succeed");
    };

    assert_eq!(recipient_emails(&job), vec!["instructor@example.org"]);
    assert_eq!(job.status(), EmailJobStatus::Pending);
    assert_eq!(harness.queue.jobs.lock().await.len(), 1);
    let events = harness.audit.events.lock().await;
    assert_eq!(events[0].action, AuditAction::CourseEmailQueued);
    assert_eq!(events[0].resource_id, job.job_id().to_string());
}

#[tokio::test]
async fn staff_target_includes_active_team_without_duplicates() {
    let harness = Harness::new(&["learner@example.org"]);
    let instructor = harness
        .add_member("instructor@example.org", CourseRole::Instructor, true)
        .await;
    harness
        .add_member("staff@example.org", CourseRole::Staff, true)
        .await;
    harness
        .add_member("pending@example.org", CourseRole::Staff, false)
        .await;
    let instructor_account = harness
        .users
        .users
        .lock()
        .await
        .iter()
        .find(|user| user.email.as_str() == "instructor@example.org")
        .map(|user| user.user_id);
    let Some(instructor_id) = instructor_account else {
        panic!("instructor should exist");
    };
    let added = harness
        .roles
        .add_role(&harness.course, instructor_id, CourseRole::Staff)
        .await;
    assert!(added.is_ok());

    let Ok(job) = harness
        .service
        .submit(&instructor, &harness.course, request(EmailTarget::Staff))
        .await
    else {
        panic!("submission should succeed");
    };

    assert_eq!(
        recipient_emails(&job),
        vec!["instructor@example.org", "staff@example.org"]
    );
}

#[tokio::test]
async fn all_target_adds_enrolled_learners() {
    let harness = Harness::new(&["learner1@example.org", "Staff@Example.org"]);
    let staff = harness
        .add_member("staff@example.org", CourseRole::Staff, true)
        .await;

    let Ok(job) = harness
        .service
        .submit(&staff, &harness.course, request(EmailTarget::All))
        .await
    else {
        panic!("submission should succeed");
    };

    assert_eq!(
        recipient_emails(&job),
        vec!["staff@example.org", "learner1@example.org"]
    );
}

#[tokio::test]
async fn outsiders_cannot_submit() {
    let harness = Harness::new(&[]);
    let outsider = UserIdentity::new("outsider", "Outsider", "outsider@example.org");

    let result = harness
        .service
        .submit(&outsider, &harness.course, request(EmailTarget::Myself))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(harness.queue.jobs.lock().await.is_empty());
}

#[tokio::test]
async fn empty_subject_is_rejected() {
    let harness = Harness::new(&[]);
    let instructor = harness
        .add_member("instructor@example.org", CourseRole::Instructor, true)
        .await;
    let mut input = request(EmailTarget::Myself);
    input.subject = "   ".to_owned();

    let result = harness
        .service
        .submit(&instructor, &harness.course, input)
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(harness.queue.jobs.lock().await.is_empty());
}

#[tokio::test]
async fn job_outcome_is_scoped_to_course() {
    let harness = Harness::new(&[]);
    let instructor = harness
        .add_member("instructor@example.org", CourseRole::Instructor, true)
        .await;
    let job_id = Uuid::new_v4();
    let other_job_id = Uuid::new_v4();
    let other_course = match CourseKey::new("HarvardX", "CS50", "2024") {
        Ok(course) => course,
        Err(error) => panic!("invalid test course: {error}"),
    };

    {
        let mut outcomes = harness.ledger.outcomes.lock().await;
        outcomes.insert(
            job_id,
            RecordedEmailOutcome {
                job_id,
                course: harness.course.clone(),
                outcome: EmailSendOutcome { sent: 9, failed: 1 },
                retries: 0,
                finished_at: Utc::now(),
            },
        );
        outcomes.insert(
            other_job_id,
            RecordedEmailOutcome {
                job_id: other_job_id,
                course: other_course,
                outcome: EmailSendOutcome { sent: 1, failed: 0 },
                retries: 0,
                finished_at: Utc::now(),
            },
        );
    }

    let found = harness
        .service
        .job_outcome(&instructor, &harness.course, job_id)
        .await;
    assert_eq!(
        found.map(|recorded| recorded.outcome).ok(),
        Some(EmailSendOutcome { sent: 9, failed: 1 })
    );

    let foreign = harness
        .service
        .job_outcome(&instructor, &harness.course, other_job_id)
        .await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));
}
