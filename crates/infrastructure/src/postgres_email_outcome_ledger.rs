use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursewright_application::{EmailOutcomeLedger, EmailResultReporter, RecordedEmailOutcome};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{CourseKey, EmailSendJob, EmailSendOutcome};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

/// PostgreSQL-backed record of finished email jobs.
#[derive(Clone)]
pub struct PostgresEmailOutcomeLedger {
    pool: PgPool,
}

impl PostgresEmailOutcomeLedger {
    /// Creates a ledger with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OutcomeRow {
    job_id: Uuid,
    org: String,
    course: String,
    run: String,
    sent: i32,
    failed: i32,
    retries: i32,
    finished_at: DateTime<Utc>,
}

fn to_count(value: i32, field: &str) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored email outcome has negative {field}")))
}

fn to_column(value: u32, field: &str) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::Internal(format!("email outcome {field} does not fit storage")))
}

impl TryFrom<OutcomeRow> for RecordedEmailOutcome {
    type Error = AppError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            job_id: row.job_id,
            course: CourseKey::new(row.org, row.course, row.run)?,
            outcome: EmailSendOutcome {
                sent: to_count(row.sent, "sent")?,
                failed: to_count(row.failed, "failed")?,
            },
            retries: to_count(row.retries, "retries")?,
            finished_at: row.finished_at,
        })
    }
}

#[async_trait]
impl EmailResultReporter for PostgresEmailOutcomeLedger {
    async fn report_outcome(
        &self,
        job: &EmailSendJob,
        outcome: EmailSendOutcome,
    ) -> AppResult<()> {
        let course = job.course();
        sqlx::query(
            r#"
            INSERT INTO course_email_outcomes (
                job_id, org, course, run, sent, failed, retries, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (job_id) DO UPDATE
            SET sent = EXCLUDED.sent,
                failed = EXCLUDED.failed,
                retries = EXCLUDED.retries,
                finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(job.job_id())
        .bind(course.org())
        .bind(course.course())
        .bind(course.run())
        .bind(to_column(outcome.sent, "sent")?)
        .bind(to_column(outcome.failed, "failed")?)
        .bind(to_column(job.attempt(), "retries")?)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record outcome for email job '{}': {error}",
                job.job_id()
            ))
        })?;

        info!(
            job_id = %job.job_id(),
            course = %course,
            sent = outcome.sent,
            failed = outcome.failed,
            "course email outcome recorded"
        );

        Ok(())
    }
}

#[async_trait]
impl EmailOutcomeLedger for PostgresEmailOutcomeLedger {
    async fn find_outcome(&self, job_id: Uuid) -> AppResult<Option<RecordedEmailOutcome>> {
        let row = sqlx::query_as::<_, OutcomeRow>(
            r#"
            SELECT job_id, org, course, run, sent, failed, retries, finished_at
            FROM course_email_outcomes
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load email job outcome: {error}"))
        })?;

        row.map(RecordedEmailOutcome::try_from).transpose()
    }
}
