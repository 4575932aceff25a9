use std::convert::Infallible;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Form, FromRequest, Path, Request, State};
use axum::http::header::CONTENT_TYPE;

use coursewright_core::{AppError, UserIdentity};
use coursewright_domain::CourseRole;

use crate::dto::{
    CourseListResponse, CourseTeamMemberResponse, CourseTeamRosterResponse, EmptyResponse,
    RolePayload,
};
use crate::error::ApiResult;
use crate::state::AppState;

use super::course_key;

/// Role carried by a membership change, read from a JSON or form body.
///
/// Body errors are held until the handler has authorized the caller.
#[derive(Debug)]
pub struct RoleRequest(Result<CourseRole, AppError>);

impl RoleRequest {
    /// Returns the requested role or the body error.
    pub fn into_role(self) -> Result<CourseRole, AppError> {
        self.0
    }
}

impl<S> FromRequest<S> for RoleRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(read_role(request, state).await))
    }
}

async fn read_role<S>(request: Request, state: &S) -> Result<CourseRole, AppError>
where
    S: Send + Sync,
{
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let payload = if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(payload) = Form::<RolePayload>::from_request(request, state)
            .await
            .map_err(|error| AppError::Validation(format!("malformed form body: {error}")))?;
        payload
    } else {
        let body = Bytes::from_request(request, state).await.map_err(|error| {
            AppError::Validation(format!("failed to read request body: {error}"))
        })?;
        if content_type.starts_with("application/json") && !body.is_empty() {
            serde_json::from_slice::<RolePayload>(&body)
                .map_err(|_| AppError::Validation("malformed JSON".to_owned()))?
        } else {
            RolePayload::default()
        }
    };

    let role = payload
        .role
        .ok_or_else(|| AppError::Validation("`role` is required".to_owned()))?;

    CourseRole::from_transport(role.as_str())
}

pub async fn list_courses_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<CourseListResponse>> {
    let courses = state
        .course_team_service
        .list_accessible_courses(&user)
        .await?;

    Ok(Json(CourseListResponse::from(courses)))
}

pub async fn team_roster_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run)): Path<(String, String, String)>,
) -> ApiResult<Json<CourseTeamRosterResponse>> {
    let course = course_key(&org, &course, &run)?;
    let roster = state.course_team_service.team_roster(&user, &course).await?;

    Ok(Json(CourseTeamRosterResponse::from(roster)))
}

pub async fn team_member_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run, email)): Path<(String, String, String, String)>,
) -> ApiResult<Json<CourseTeamMemberResponse>> {
    let course = course_key(&org, &course, &run)?;
    let member = state
        .course_team_service
        .describe_member(&user, &course, email.as_str())
        .await?;

    Ok(Json(CourseTeamMemberResponse::from(member)))
}

pub async fn grant_team_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run, email)): Path<(String, String, String, String)>,
    request: RoleRequest,
) -> ApiResult<Json<EmptyResponse>> {
    let course = course_key(&org, &course, &run)?;
    state
        .course_team_service
        .check_member_change(&user, &course, email.as_str())
        .await?;
    let role = request.into_role()?;
    state
        .course_team_service
        .grant(&user, &course, email.as_str(), role)
        .await?;

    Ok(Json(EmptyResponse::default()))
}

pub async fn revoke_team_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((org, course, run, email)): Path<(String, String, String, String)>,
) -> ApiResult<Json<EmptyResponse>> {
    let course = course_key(&org, &course, &run)?;
    state
        .course_team_service
        .revoke(&user, &course, email.as_str())
        .await?;

    Ok(Json(EmptyResponse::default()))
}
