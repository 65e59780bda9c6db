//! In-memory storage for tests and local development.
//!
//! One mutex guards records, the `(member, event)` index and the directory,
//! so each trait call is a transaction. Writes are staged and only applied
//! once every check has passed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{CheckInError, Result};
use crate::id::{AccountId, AttendanceId, EventInstanceId, MemberId};
use crate::traits::{AttendanceStore, MemberDirectory};
use crate::types::{AttendanceRecord, DirectoryMember, NewAttendance, NewMember};

#[derive(Default)]
struct State {
    records: HashMap<AttendanceId, AttendanceRecord>,
    by_member_event: HashMap<(MemberId, EventInstanceId), AttendanceId>,
    members: HashMap<MemberId, DirectoryMember>,
}

impl State {
    fn record(&self, id: AttendanceId) -> Result<&AttendanceRecord> {
        self.records.get(&id).ok_or(CheckInError::RecordNotFound(id))
    }

    /// Another record holding `(member, event)`, ignoring `except`.
    fn conflicting(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
        except: AttendanceId,
    ) -> Option<AttendanceId> {
        self.by_member_event
            .get(&(member_id, event_instance_id))
            .copied()
            .filter(|id| *id != except)
    }

    fn put(&mut self, record: AttendanceRecord) {
        if let Some(member_id) = record.member_id {
            self.by_member_event
                .insert((member_id, record.event_instance_id), record.id);
        }
        self.records.insert(record.id, record);
    }

    /// The only member satisfying `pred`. Zero or several matches give `None`.
    fn sole_member(&self, pred: impl Fn(&DirectoryMember) -> bool) -> Option<DirectoryMember> {
        let mut matches = self.members.values().filter(|m| pred(m));
        match (matches.next(), matches.next()) {
            (Some(member), None) => Some(member.clone()),
            (Some(_), Some(_)) => {
                debug!("Directory lookup matched several members");
                None
            }
            _ => None,
        }
    }

    fn sorted(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
        records.sort_by_key(|r| (r.check_in_time, r.id));
        records
    }
}

/// In-memory check-in store.
///
/// Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_next_commit: AtomicBool,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a directory member (fixtures, dev seeding).
    pub fn add_member(&self, member: DirectoryMember) -> MemberId {
        let id = member.id;
        self.state().members.insert(id, member);
        id
    }

    /// Convenience for a member with just a name and phone.
    pub fn add_member_with_phone(&self, full_name: &str, phone: &str) -> MemberId {
        self.add_member(DirectoryMember {
            id: MemberId::new(),
            full_name: full_name.to_string(),
            phone: Some(phone.to_string()),
            contact_email: None,
            account_id: None,
            created_at: Utc::now(),
        })
    }

    /// Attach a login account to an existing member.
    pub fn link_account(&self, account_id: AccountId, member_id: MemberId) {
        if let Some(member) = self.state().members.get_mut(&member_id) {
            member.account_id = Some(account_id);
        }
    }

    /// Make the next write fail after its checks, before anything is applied.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make `ping` report the store as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn member_count(&self) -> usize {
        self.state().members.len()
    }

    fn check_injected_failure(&self) -> Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CheckInError::storage("injected failure before commit"));
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord> {
        let mut state = self.state();

        if let Some(member_id) = new.member_id {
            if state
                .by_member_event
                .contains_key(&(member_id, new.event_instance_id))
            {
                return Err(CheckInError::DuplicateCheckIn {
                    member_id,
                    event_instance_id: new.event_instance_id,
                });
            }
        }

        let record = AttendanceRecord::from_new(new);
        self.check_injected_failure()?;
        state.put(record.clone());
        debug!(attendance_id = %record.id, "Inserted attendance record");
        Ok(record)
    }

    async fn find(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>> {
        Ok(self.state().records.get(&id).cloned())
    }

    async fn find_for_member_event(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
    ) -> Result<Option<AttendanceRecord>> {
        let state = self.state();
        Ok(state
            .by_member_event
            .get(&(member_id, event_instance_id))
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn list_for_event(&self, event_instance_id: EventInstanceId) -> Result<Vec<AttendanceRecord>> {
        let records = self
            .state()
            .records
            .values()
            .filter(|r| r.event_instance_id == event_instance_id)
            .cloned()
            .collect();
        Ok(State::sorted(records))
    }

    async fn list_for_member(&self, member_id: MemberId) -> Result<Vec<AttendanceRecord>> {
        let records = self
            .state()
            .records
            .values()
            .filter(|r| r.member_id == Some(member_id))
            .cloned()
            .collect();
        Ok(State::sorted(records))
    }

    async fn link_member(
        &self,
        attendance_id: AttendanceId,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut state = self.state();

        let mut record = state.record(attendance_id)?.clone();
        if !state.members.contains_key(&member_id) {
            return Err(CheckInError::MemberNotFound(member_id));
        }
        if let Some(existing) = state.conflicting(member_id, record.event_instance_id, record.id) {
            return Err(CheckInError::ConflictingAttendance {
                member_id,
                existing,
            });
        }

        if record.link_to(member_id, now)? {
            self.check_injected_failure()?;
            state.put(record.clone());
            info!(attendance_id = %record.id, member_id = %member_id, "Linked attendance to member");
        }
        Ok(record)
    }

    async fn create_member_and_link(
        &self,
        attendance_id: AttendanceId,
        fields: NewMember,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, DirectoryMember)> {
        let mut state = self.state();

        let mut record = state.record(attendance_id)?.clone();
        if let (true, Some(current)) = (record.link_status.is_linked(), record.member_id) {
            return Err(CheckInError::ConflictingAttendance {
                member_id: current,
                existing: record.id,
            });
        }

        let member = fields
            .into_member(
                record.visitor_name.as_deref(),
                record.visitor_phone.as_deref(),
                now,
            )
            .ok_or_else(|| CheckInError::invalid_input("new member needs a name"))?;
        record.link_to(member.id, now)?;

        self.check_injected_failure()?;
        state.members.insert(member.id, member.clone());
        state.put(record.clone());

        info!(
            attendance_id = %record.id,
            member_id = %member.id,
            "Created member and linked attendance"
        );
        Ok((record, member))
    }

    async fn ping(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CheckInError::storage("memory store marked offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberDirectory for MemoryStore {
    async fn find_member(&self, id: MemberId) -> Result<Option<DirectoryMember>> {
        Ok(self.state().members.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryMember>> {
        Ok(self
            .state()
            .sole_member(|m| m.phone.as_deref() == Some(phone)))
    }

    async fn find_by_contact_email(&self, email: &str) -> Result<Option<DirectoryMember>> {
        Ok(self
            .state()
            .sole_member(|m| m.contact_email.as_deref() == Some(email)))
    }

    async fn member_for_account(&self, account_id: AccountId) -> Result<Option<MemberId>> {
        Ok(self
            .state()
            .members
            .values()
            .find(|m| m.account_id == Some(account_id))
            .map(|m| m.id))
    }
}
