//! Attendance storage.
//!
//! Every backend must guarantee at most one record per non-null
//! `(member_id, event_instance_id)` at the storage layer, and report a
//! violation as [`CheckInError::DuplicateCheckIn`]. Callers never do
//! check-then-insert.
//!
//! [`CheckInError::DuplicateCheckIn`]: crate::error::CheckInError::DuplicateCheckIn

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::id::{AttendanceId, EventInstanceId, MemberId};
use crate::traits::directory::MemberDirectory;
use crate::types::{AttendanceRecord, DirectoryMember, NewAttendance, NewMember};

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Insert a record. Fails with `DuplicateCheckIn` when the member already
    /// has a record for the event.
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord>;

    async fn find(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>>;

    async fn find_for_member_event(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
    ) -> Result<Option<AttendanceRecord>>;

    /// All records for an event, oldest check-in first.
    async fn list_for_event(&self, event_instance_id: EventInstanceId) -> Result<Vec<AttendanceRecord>>;

    /// All records linked to a member, oldest check-in first.
    async fn list_for_member(&self, member_id: MemberId) -> Result<Vec<AttendanceRecord>>;

    /// Records for an event that still need an operator.
    async fn list_unreconciled(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .list_for_event(event_instance_id)
            .await?
            .into_iter()
            .filter(|r| !r.link_status.is_linked())
            .collect())
    }

    /// Link an existing record to an existing member, in one transaction.
    ///
    /// Fails with `RecordNotFound`, `MemberNotFound`, or
    /// `ConflictingAttendance` when another record already holds
    /// `(member_id, event)`.
    async fn link_member(
        &self,
        attendance_id: AttendanceId,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord>;

    /// Mint a directory member and link the record to it, in one transaction.
    ///
    /// On any failure neither the member nor the link is written.
    async fn create_member_and_link(
        &self,
        attendance_id: AttendanceId,
        fields: NewMember,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, DirectoryMember)>;

    /// Cheap liveness check for `/health`.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Everything the check-in engine needs from its backend.
pub trait CheckInStore: AttendanceStore + MemberDirectory {}

impl<T: AttendanceStore + MemberDirectory> CheckInStore for T {}
