use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use coursewright_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;


pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let course_routes = Router::new()
        .route(
            "/api/courses",
            get(handlers::course_team::list_courses_handler),
        )
        .route(
            "/api/courses/{org}/{course}/{run}/team",
            get(handlers::course_team::team_roster_handler),
        )
        .route(
            "/api/courses/{org}/{course}/{run}/team/{email}",
            get(handlers::course_team::team_member_handler)
                .post(handlers::course_team::grant_team_role_handler)
                .put(handlers::course_team::grant_team_role_handler)
                .delete(handlers::course_team::revoke_team_role_handler),
        )
        .route(
            "/api/courses/{org}/{course}/{run}/email",
            post(handlers::bulk_email::send_course_email_handler),
        )
        .route(
            "/api/courses/{org}/{course}/{run}/email/{job_id}",
            get(handlers::bulk_email::email_job_outcome_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_actor,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(course_routes)
        .layer(cors::build_cors_layer(frontend_url)?)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
