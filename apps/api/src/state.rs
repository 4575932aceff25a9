use std::sync::Arc;

use coursewright_application::{BulkEmailService, CourseTeamService, UserDirectory};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub course_team_service: CourseTeamService,
    pub bulk_email_service: BulkEmailService,
    pub user_directory: Arc<dyn UserDirectory>,
}
