use axum::{extract::Extension, http::StatusCode, Json};
use checkin::{AttendanceRecord, CheckInMethod, EventInstanceId, MemberId, PublicSubmission};
use serde::Deserialize;

use super::{require_admin, require_session};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct TokenCheckInRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualCheckInRequest {
    pub member_id: MemberId,
    pub event_instance_id: EventInstanceId,
}

/// Signed-in member scans a displayed code.
pub async fn check_in_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(body): Json<TokenCheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), ApiError> {
    let user = require_session(auth)?;
    let record = state
        .service
        .check_in_via_token(&user.session(), &body.token)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Operator records a member by hand.
pub async fn manual_check_in_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(body): Json<ManualCheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), ApiError> {
    require_admin(auth)?;
    let record = state
        .service
        .check_in(body.member_id, body.event_instance_id, CheckInMethod::Manual)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Anonymous self check-in. A retried submission may return an existing record.
pub async fn public_check_in_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<PublicSubmission>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    let record = state
        .service
        .public_check_in(body)
        .await
        .map_err(|e| ApiError::Public(e.into_public()))?;
    Ok(Json(record))
}
