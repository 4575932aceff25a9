pub mod bulk_email;
pub mod course_team;
pub mod health;

use coursewright_core::AppResult;
use coursewright_domain::CourseKey;

fn course_key(org: &str, course: &str, run: &str) -> AppResult<CourseKey> {
    CourseKey::new(org, course, run)
}
