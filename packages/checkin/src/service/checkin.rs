use chrono::Utc;
use tracing::{info, warn};

use super::CheckInService;
use crate::error::{CheckInError, Result};
use crate::id::{EventInstanceId, MemberId};
use crate::types::{AttendanceRecord, CheckInMethod, NewAttendance, SessionIdentity};

impl CheckInService {
    /// Record that a known member attended an event.
    ///
    /// Uniqueness is left to the store: a concurrent second call for the same
    /// pair loses at insert time with `DuplicateCheckIn`.
    pub async fn check_in(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
        method: CheckInMethod,
    ) -> Result<AttendanceRecord> {
        if self.store.find_member(member_id).await?.is_none() {
            return Err(CheckInError::MemberNotFound(member_id));
        }

        let record = self
            .store
            .insert(NewAttendance::member(
                member_id,
                event_instance_id,
                method,
                Utc::now(),
            ))
            .await?;

        info!(
            attendance_id = %record.id,
            member_id = %member_id,
            event_instance_id = %event_instance_id,
            method = %method,
            "Member checked in"
        );
        Ok(record)
    }

    /// Check in the session's own member profile by scanning a token.
    ///
    /// Token errors keep their detail; callers facing the public should use
    /// [`CheckInError::into_public`].
    pub async fn check_in_via_token(
        &self,
        session: &SessionIdentity,
        encoded_token: &str,
    ) -> Result<AttendanceRecord> {
        let payload = self.tokens.validate(encoded_token).map_err(|e| {
            warn!(account_id = %session.account_id, error = %e, "Rejected check-in token");
            e
        })?;

        let member_id = match session.member_id {
            Some(id) => id,
            None => self
                .store
                .member_for_account(session.account_id)
                .await?
                .ok_or(CheckInError::NotLinkedToMember)?,
        };

        self.check_in(member_id, payload.event_instance_id, CheckInMethod::Qr)
            .await
    }
}
