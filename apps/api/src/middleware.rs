use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use coursewright_core::{AppError, UserIdentity};
use coursewright_domain::EmailAddress;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the email of the caller, set by the authenticating proxy.
pub const ACTOR_EMAIL_HEADER: &str = "x-authenticated-email";

pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header_value = request
        .headers()
        .get(ACTOR_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let email = EmailAddress::new(header_value)
        .map_err(|_| AppError::Unauthorized("authentication required".to_owned()))?;
    let user = state
        .user_directory
        .find_user_by_email(&email)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("unknown or inactive account".to_owned()))?;

    debug!(actor = %user.email, "request actor resolved");

    let identity = UserIdentity::new(
        user.user_id.to_string(),
        user.email.as_str(),
        user.email.as_str(),
    );
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
