use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use checkin::{CheckInToken, EventInstanceId, ROTATING_REFRESH_SECS};
use serde::Serialize;
use tracing::info;

use super::require_admin;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::ApiError;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub event_instance_id: EventInstanceId,
    pub expires_at: Option<DateTime<Utc>>,
    /// Set for rotating tokens: when the display should fetch the next one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_after_secs: Option<u64>,
}

impl TokenResponse {
    fn new(token: CheckInToken, refresh_after_secs: Option<u64>) -> Self {
        Self {
            expires_at: token.payload.expires_at(),
            event_instance_id: token.payload.event_instance_id,
            token: token.encoded,
            refresh_after_secs,
        }
    }
}

/// Mint a short-lived token for a kiosk display.
pub async fn issue_rotating_token_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(event_id): Path<EventInstanceId>,
) -> Result<Json<TokenResponse>, ApiError> {
    let admin = require_admin(auth)?;
    let token = state.service.issue_rotating_token(event_id);
    info!(event_instance_id = %event_id, account_id = %admin.account_id, "Issued rotating token");
    Ok(Json(TokenResponse::new(token, Some(ROTATING_REFRESH_SECS))))
}

/// Mint a day-long token for a printed code.
pub async fn issue_static_token_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(event_id): Path<EventInstanceId>,
) -> Result<Json<TokenResponse>, ApiError> {
    let admin = require_admin(auth)?;
    let token = state.service.issue_static_token(event_id);
    info!(event_instance_id = %event_id, account_id = %admin.account_id, "Issued static token");
    Ok(Json(TokenResponse::new(token, None)))
}
