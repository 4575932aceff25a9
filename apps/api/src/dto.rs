use coursewright_application::{
    AccessibleCourses, CourseTeamMember, CourseTeamRoster, RecordedEmailOutcome,
};
use coursewright_domain::{CourseKey, EmailSendJob, UserAccount};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Empty JSON object returned by successful membership changes.
#[derive(Debug, Default, Serialize)]
pub struct EmptyResponse {}

/// Raw role payload accepted as JSON or form data.
#[derive(Debug, Default, Deserialize)]
pub struct RolePayload {
    pub role: Option<String>,
}

/// API representation of a course team member.
#[derive(Debug, Serialize)]
pub struct CourseTeamMemberResponse {
    pub email: String,
    pub active: bool,
    pub role: Option<&'static str>,
}

impl From<CourseTeamMember> for CourseTeamMemberResponse {
    fn from(value: CourseTeamMember) -> Self {
        Self {
            email: value.email.as_str().to_owned(),
            active: value.active,
            role: value.role.map(|role| role.as_str()),
        }
    }
}

/// Roster entry for one user.
#[derive(Debug, Serialize)]
pub struct CourseTeamUserResponse {
    pub email: String,
    pub active: bool,
}

impl From<UserAccount> for CourseTeamUserResponse {
    fn from(value: UserAccount) -> Self {
        Self {
            email: value.email.as_str().to_owned(),
            active: value.is_active,
        }
    }
}

/// API representation of the course team listing.
#[derive(Debug, Serialize)]
pub struct CourseTeamRosterResponse {
    pub instructors: Vec<CourseTeamUserResponse>,
    pub staff: Vec<CourseTeamUserResponse>,
    pub can_manage: bool,
}

impl From<CourseTeamRoster> for CourseTeamRosterResponse {
    fn from(value: CourseTeamRoster) -> Self {
        Self {
            instructors: value
                .instructors
                .into_iter()
                .map(CourseTeamUserResponse::from)
                .collect(),
            staff: value
                .staff
                .into_iter()
                .map(CourseTeamUserResponse::from)
                .collect(),
            can_manage: value.can_manage,
        }
    }
}

/// Course entry on the caller's course listing.
#[derive(Debug, Serialize)]
pub struct CourseSummaryResponse {
    pub org: String,
    pub course: String,
    pub run: String,
    pub location: String,
}

impl From<CourseKey> for CourseSummaryResponse {
    fn from(value: CourseKey) -> Self {
        Self {
            org: value.org().to_owned(),
            course: value.course().to_owned(),
            run: value.run().to_owned(),
            location: value.location(),
        }
    }
}

/// Courses the caller may open.
#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseSummaryResponse>,
    pub disable_course_creation: bool,
}

impl From<AccessibleCourses> for CourseListResponse {
    fn from(value: AccessibleCourses) -> Self {
        Self {
            courses: value
                .courses
                .into_iter()
                .map(CourseSummaryResponse::from)
                .collect(),
            disable_course_creation: value.disable_course_creation,
        }
    }
}

/// Incoming payload for sending a course email.
#[derive(Debug, Deserialize)]
pub struct SendCourseEmailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// Acknowledgement for a queued course email.
#[derive(Debug, Serialize)]
pub struct EmailJobAcceptedResponse {
    pub job_id: String,
    pub recipients: usize,
}

impl From<&EmailSendJob> for EmailJobAcceptedResponse {
    fn from(value: &EmailSendJob) -> Self {
        Self {
            job_id: value.job_id().to_string(),
            recipients: value.recipients().len(),
        }
    }
}

/// Reported result of a finished course email.
#[derive(Debug, Serialize)]
pub struct EmailJobOutcomeResponse {
    pub job_id: String,
    pub sent: u32,
    pub failed: u32,
    pub retries: u32,
    pub finished_at: String,
}

impl From<RecordedEmailOutcome> for EmailJobOutcomeResponse {
    fn from(value: RecordedEmailOutcome) -> Self {
        Self {
            job_id: value.job_id.to_string(),
            sent: value.outcome.sent,
            failed: value.outcome.failed,
            retries: value.retries,
            finished_at: value.finished_at.to_rfc3339(),
        }
    }
}
