//! Operator reconciliation of visitor and unverified records.

use chrono::Utc;
use tracing::info;

use super::CheckInService;
use crate::error::Result;
use crate::id::{AttendanceId, MemberId};
use crate::types::{AttendanceRecord, DirectoryMember, NewMember};

impl CheckInService {
    /// Point an attendance record at an existing member.
    ///
    /// The original check-in time is kept. Fails with `ConflictingAttendance`
    /// instead of merging when the member already has a record for the event.
    pub async fn link_to_member(
        &self,
        attendance_id: AttendanceId,
        member_id: MemberId,
    ) -> Result<AttendanceRecord> {
        let record = self
            .store
            .link_member(attendance_id, member_id, Utc::now())
            .await?;
        info!(attendance_id = %attendance_id, member_id = %member_id, "Attendance reconciled");
        Ok(record)
    }

    /// Mint a member from the visitor's details and link the record to it.
    ///
    /// Atomic: a failure leaves neither a new member nor a changed record.
    pub async fn create_member_and_link(
        &self,
        attendance_id: AttendanceId,
        fields: NewMember,
    ) -> Result<(AttendanceRecord, DirectoryMember)> {
        let (record, member) = self
            .store
            .create_member_and_link(attendance_id, fields, Utc::now())
            .await?;
        info!(
            attendance_id = %attendance_id,
            member_id = %member.id,
            "Attendance reconciled to new member"
        );
        Ok((record, member))
    }
}
