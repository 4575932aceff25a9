use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;

use coursewright_application::SendCourseEmailInput;
use coursewright_core::{AppError, UserIdentity};
use coursewright_domain::EmailTarget;
use uuid::Uuid;

use crate::dto::{EmailJobAcceptedResponse, EmailJobOutcomeResponse, SendCourseEmailRequest};
use crate::error::ApiResult;
use crate::state::AppState;

use super::course_key;

pub async fn send_course_email_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run)): Path<(String, String, String)>,
    payload: Result<Json<SendCourseEmailRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmailJobAcceptedResponse>)> {
    let course = course_key(&org, &course, &run)?;
    let Json(payload) =
        payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let job = state
        .bulk_email_service
        .submit(
            &user,
            &course,
            SendCourseEmailInput {
                target: EmailTarget::from_str(payload.to.as_str())?,
                subject: payload.subject,
                message: payload.message,
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EmailJobAcceptedResponse::from(&job)),
    ))
}

pub async fn email_job_outcome_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run, job_id)): Path<(String, String, String, String)>,
) -> ApiResult<Json<EmailJobOutcomeResponse>> {
    let course = course_key(&org, &course, &run)?;
    let job_id = Uuid::parse_str(job_id.as_str())
        .map_err(|error| AppError::Validation(format!("invalid job id '{job_id}': {error}")))?;

    let outcome = state
        .bulk_email_service
        .job_outcome(&user, &course, job_id)
        .await?;

    Ok(Json(EmailJobOutcomeResponse::from(outcome)))
}
