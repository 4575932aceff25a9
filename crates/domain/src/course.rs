use std::fmt::{Display, Formatter};
use std::str::FromStr;

use coursewright_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Organization/course/run triple identifying one course offering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseKey {
    org: NonEmptyString,
    course: NonEmptyString,
    run: NonEmptyString,
}

impl CourseKey {
    /// Creates a validated course key.
    ///
    /// Each part must be non-empty and must not contain `/`, which is the
    /// separator of the display form.
    pub fn new(
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            org: course_key_part("org", org.into())?,
            course: course_key_part("course", course.into())?,
            run: course_key_part("run", run.into())?,
        })
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn org(&self) -> &str {
        self.org.as_str()
    }

    /// Returns the course number.
    #[must_use]
    pub fn course(&self) -> &str {
        self.course.as_str()
    }

    /// Returns the run name.
    #[must_use]
    pub fn run(&self) -> &str {
        self.run.as_str()
    }

    /// Returns the legacy location string used by access checks.
    #[must_use]
    pub fn location(&self) -> String {
        format!("i4x://{}/{}/course/{}", self.org, self.course, self.run)
    }
}

impl Display for CourseKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}/{}", self.org, self.course, self.run)
    }
}

impl FromStr for CourseKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(course), Some(run), None) => Self::new(org, course, run),
            _ => Err(AppError::Validation(format!(
                "course key '{value}' must have the form org/course/run"
            ))),
        }
    }
}

fn course_key_part(label: &str, value: String) -> AppResult<NonEmptyString> {
    let trimmed = value.trim();
    if trimmed.contains('/') {
        return Err(AppError::Validation(format!(
            "course {label} '{trimmed}' must not contain '/'"
        )));
    }

    NonEmptyString::new(trimmed)
        .map_err(|_| AppError::Validation(format!("course {label} must not be empty")))
}
