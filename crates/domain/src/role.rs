use std::str::FromStr;

use coursewright_core::AppError;
use serde::{Deserialize, Serialize};

/// Course-team role held by a user within one course.
///
/// Variants are declared in priority order, so the derived `Ord` sorts the
/// most privileged role first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseRole {
    /// Full course-team privileges, including managing other members.
    Instructor,
    /// Course-team member without management rights.
    Staff,
}

impl CourseRole {
    /// Roles ordered from highest to lowest privilege.
    pub const PRIORITY: [Self; 2] = [Self::Instructor, Self::Staff];

    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instructor => "instructor",
            Self::Staff => "staff",
        }
    }

    /// Returns whether holding this role also grants the capabilities of `other`.
    #[must_use]
    pub fn includes(&self, other: Self) -> bool {
        match self {
            Self::Instructor => true,
            Self::Staff => other == Self::Staff,
        }
    }

    /// Returns the highest-privilege role among the held roles.
    #[must_use]
    pub fn highest<'a>(held: impl IntoIterator<Item = &'a CourseRole>) -> Option<Self> {
        let held: Vec<CourseRole> = held.into_iter().copied().collect();
        Self::PRIORITY
            .into_iter()
            .find(|candidate| held.contains(candidate))
    }

    /// Parses a transport value into a role.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value.trim())
    }
}

impl FromStr for CourseRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "instructor" => Ok(Self::Instructor),
            "staff" => Ok(Self::Staff),
            _ => Err(AppError::Validation(format!(
                "unknown course role '{value}'"
            ))),
        }
    }
}

impl std::fmt::Display for CourseRole {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
