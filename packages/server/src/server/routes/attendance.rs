use axum::{
    extract::{Extension, Path},
    Json,
};
use checkin::{AttendanceId, AttendanceRecord, DirectoryMember, EventInstanceId, MemberId, NewMember};
use serde::{Deserialize, Serialize};

use super::require_admin;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub member_id: MemberId,
}

#[derive(Debug, Serialize)]
pub struct CreateMemberResponse {
    pub attendance: AttendanceRecord,
    pub member: DirectoryMember,
}

pub async fn event_attendance_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(event_id): Path<EventInstanceId>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
    require_admin(auth)?;
    Ok(Json(state.service.attendance_for_event(event_id).await?))
}

/// Visitor and unverified records still to be reconciled.
pub async fn unreconciled_attendance_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(event_id): Path<EventInstanceId>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
    require_admin(auth)?;
    Ok(Json(state.service.unreconciled_for_event(event_id).await?))
}

pub async fn member_attendance_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(member_id): Path<MemberId>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
    require_admin(auth)?;
    Ok(Json(state.service.attendance_for_member(member_id).await?))
}

pub async fn link_attendance_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(attendance_id): Path<AttendanceId>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    require_admin(auth)?;
    let record = state
        .service
        .link_to_member(attendance_id, body.member_id)
        .await?;
    Ok(Json(record))
}

pub async fn create_member_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(attendance_id): Path<AttendanceId>,
    Json(fields): Json<NewMember>,
) -> Result<Json<CreateMemberResponse>, ApiError> {
    require_admin(auth)?;
    let (attendance, member) = state
        .service
        .create_member_and_link(attendance_id, fields)
        .await?;
    Ok(Json(CreateMemberResponse { attendance, member }))
}
