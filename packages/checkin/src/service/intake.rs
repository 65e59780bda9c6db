//! Anonymous self check-in.
//!
//! Nothing here is trusted. A member claim is honoured only when the
//! directory confirms it; otherwise it is stored as `ClaimedUnverified` so an
//! operator can reconcile it later. No member link is ever invented and no
//! claim is dropped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::CheckInService;
use crate::error::{CheckInError, Result};
use crate::id::MemberId;
use crate::types::{
    non_blank, AttendanceRecord, AttendeeCategory, CheckInMethod, LinkStatus, NewAttendance,
};

/// Longest accepted free-text field.
const MAX_FIELD_LEN: usize = 500;

/// What an anonymous submitter typed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSubmission {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub category: AttendeeCategory,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of matching a submitter's claim against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    LinkedMember(MemberId),
    Visitor,
    ClaimedUnverified,
}

impl Classification {
    pub fn member_id(self) -> Option<MemberId> {
        match self {
            Self::LinkedMember(id) => Some(id),
            _ => None,
        }
    }

    /// Stored category. An unverified claim is stored as a visitor.
    pub fn category(self) -> AttendeeCategory {
        match self {
            Self::LinkedMember(_) => AttendeeCategory::Member,
            Self::Visitor | Self::ClaimedUnverified => AttendeeCategory::Visitor,
        }
    }

    pub fn link_status(self) -> LinkStatus {
        match self {
            Self::LinkedMember(_) => LinkStatus::Linked,
            Self::Visitor => LinkStatus::Visitor,
            Self::ClaimedUnverified => LinkStatus::ClaimedUnverified,
        }
    }
}

/// Combine the claimed category with the directory match, if one was attempted.
pub fn classify_claim(claimed: AttendeeCategory, matched: Option<MemberId>) -> Classification {
    match (claimed, matched) {
        (AttendeeCategory::Member, Some(id)) => Classification::LinkedMember(id),
        (AttendeeCategory::Member, None) => Classification::ClaimedUnverified,
        (AttendeeCategory::Visitor, _) => Classification::Visitor,
    }
}

fn bounded(field: &str, value: Option<String>) -> Result<Option<String>> {
    match non_blank(value) {
        Some(v) if v.chars().count() > MAX_FIELD_LEN => Err(CheckInError::invalid_input(format!(
            "{} is longer than {} characters",
            field, MAX_FIELD_LEN
        ))),
        other => Ok(other),
    }
}

impl CheckInService {
    /// Record an anonymous check-in against a displayed token.
    ///
    /// Once the submitter resolves to a member, retries return the existing
    /// record instead of creating another.
    pub async fn public_check_in(&self, submission: PublicSubmission) -> Result<AttendanceRecord> {
        let payload = self.tokens.validate(&submission.token)?;
        let event_instance_id = payload.event_instance_id;

        let name = bounded("name", Some(submission.name))?
            .ok_or_else(|| CheckInError::invalid_input("name is required"))?;
        let phone = bounded("phone", submission.phone)?;
        let notes = bounded("notes", submission.notes)?;

        let matched = match (submission.category, phone.as_deref()) {
            (AttendeeCategory::Member, Some(phone)) => self.resolve_member(phone).await?,
            _ => None,
        };
        let classification = classify_claim(submission.category, matched);
        debug!(event_instance_id = %event_instance_id, ?classification, "Classified public check-in");

        if let Some(member_id) = classification.member_id() {
            if let Some(existing) = self
                .store
                .find_for_member_event(member_id, event_instance_id)
                .await?
            {
                debug!(attendance_id = %existing.id, "Public check-in already recorded");
                return Ok(existing);
            }
        }

        let new = NewAttendance {
            event_instance_id,
            member_id: classification.member_id(),
            check_in_time: Utc::now(),
            method: CheckInMethod::PublicForm,
            visitor_name: Some(name),
            visitor_phone: phone,
            category: classification.category(),
            link_status: classification.link_status(),
            notes,
        };

        let record = match self.store.insert(new).await {
            Ok(record) => record,
            // Lost a race with a concurrent identical submission.
            Err(CheckInError::DuplicateCheckIn {
                member_id,
                event_instance_id,
            }) => self
                .store
                .find_for_member_event(member_id, event_instance_id)
                .await?
                .ok_or_else(|| CheckInError::storage("duplicate reported but no record found"))?,
            Err(e) => return Err(e),
        };

        info!(
            attendance_id = %record.id,
            event_instance_id = %event_instance_id,
            link_status = %record.link_status,
            "Public check-in recorded"
        );
        Ok(record)
    }

    /// Phone first, then the phone value as a linked account's contact email.
    async fn resolve_member(&self, phone: &str) -> Result<Option<MemberId>> {
        if let Some(member) = self.store.find_by_phone(phone).await? {
            return Ok(Some(member.id));
        }
        Ok(self
            .store
            .find_by_contact_email(phone)
            .await?
            .map(|m| m.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_claim() {
        let member = MemberId::new();
        assert_eq!(
            classify_claim(AttendeeCategory::Member, Some(member)),
            Classification::LinkedMember(member)
        );
        assert_eq!(
            classify_claim(AttendeeCategory::Member, None),
            Classification::ClaimedUnverified
        );
        assert_eq!(
            classify_claim(AttendeeCategory::Visitor, None),
            Classification::Visitor
        );
    }

    #[test]
    fn test_unverified_claim_is_stored_as_visitor() {
        let c = Classification::ClaimedUnverified;
        assert_eq!(c.category(), AttendeeCategory::Visitor);
        assert_eq!(c.link_status(), LinkStatus::ClaimedUnverified);
        assert_eq!(c.member_id(), None);
    }

    #[test]
    fn test_bounded_trims_and_limits() {
        assert_eq!(bounded("notes", Some("  hi ".into())).unwrap().as_deref(), Some("hi"));
        assert_eq!(bounded("notes", Some("   ".into())).unwrap(), None);
        assert!(bounded("notes", Some("x".repeat(MAX_FIELD_LEN + 1))).is_err());
    }
}
