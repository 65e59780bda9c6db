use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CheckInError, Result};
use crate::id::{AttendanceId, EventInstanceId, MemberId};

/// How an attendance record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInMethod {
    /// Operator recorded it by hand.
    Manual,
    /// Authenticated member scanned a token.
    Qr,
    /// Anonymous submission through the public form.
    PublicForm,
}

/// The identity the attendee claimed. Independent of whether a directory link exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendeeCategory {
    Member,
    Visitor,
}

/// Identity state of a record.
///
/// `Visitor` and `ClaimedUnverified` both move to `Linked` through
/// reconciliation. Nothing leaves `Linked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Visitor,
    /// Submitter said they were a member but automatic matching failed.
    ClaimedUnverified,
    Linked,
}

impl LinkStatus {
    pub fn is_linked(self) -> bool {
        self == Self::Linked
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CheckInError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CheckInError::invalid_input(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(CheckInMethod {
    Manual => "MANUAL",
    Qr => "QR",
    PublicForm => "PUBLIC_FORM",
});

text_enum!(AttendeeCategory {
    Member => "MEMBER",
    Visitor => "VISITOR",
});

text_enum!(LinkStatus {
    Visitor => "VISITOR",
    ClaimedUnverified => "CLAIMED_UNVERIFIED",
    Linked => "LINKED",
});

/// One attendance row.
///
/// `check_in_time` is fixed at creation. Reconciliation only touches
/// `member_id`, `category`, `link_status` and `linked_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub event_instance_id: EventInstanceId,
    pub member_id: Option<MemberId>,
    pub check_in_time: DateTime<Utc>,
    pub method: CheckInMethod,
    pub visitor_name: Option<String>,
    pub visitor_phone: Option<String>,
    pub category: AttendeeCategory,
    pub link_status: LinkStatus,
    pub notes: Option<String>,
    pub linked_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Materialise a new record from an insert request.
    pub fn from_new(new: NewAttendance) -> Self {
        Self {
            id: AttendanceId::new(),
            event_instance_id: new.event_instance_id,
            member_id: new.member_id,
            check_in_time: new.check_in_time,
            method: new.method,
            visitor_name: new.visitor_name,
            visitor_phone: new.visitor_phone,
            category: new.category,
            link_status: new.link_status,
            notes: new.notes,
            linked_at: new.member_id.map(|_| new.check_in_time),
        }
    }

    /// True for a claimed-but-unverified record awaiting an operator.
    pub fn is_unverified_claim(&self) -> bool {
        self.link_status == LinkStatus::ClaimedUnverified
    }

    /// Apply an operator link.
    ///
    /// Returns `Ok(false)` when the record is already linked to `member_id`.
    /// A record linked to someone else is never re-pointed.
    pub fn link_to(&mut self, member_id: MemberId, now: DateTime<Utc>) -> Result<bool> {
        match (self.link_status, self.member_id) {
            (LinkStatus::Linked, Some(current)) if current == member_id => Ok(false),
            (LinkStatus::Linked, Some(current)) => Err(CheckInError::ConflictingAttendance {
                member_id: current,
                existing: self.id,
            }),
            _ => {
                self.member_id = Some(member_id);
                self.category = AttendeeCategory::Member;
                self.link_status = LinkStatus::Linked;
                self.linked_at = Some(now);
                Ok(true)
            }
        }
    }
}

/// Insert request for an attendance row.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub event_instance_id: EventInstanceId,
    pub member_id: Option<MemberId>,
    pub check_in_time: DateTime<Utc>,
    pub method: CheckInMethod,
    pub visitor_name: Option<String>,
    pub visitor_phone: Option<String>,
    pub category: AttendeeCategory,
    pub link_status: LinkStatus,
    pub notes: Option<String>,
}

impl NewAttendance {
    /// A member check-in (manual or QR).
    pub fn member(
        member_id: MemberId,
        event_instance_id: EventInstanceId,
        method: CheckInMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_instance_id,
            member_id: Some(member_id),
            check_in_time: now,
            method,
            visitor_name: None,
            visitor_phone: None,
            category: AttendeeCategory::Member,
            link_status: LinkStatus::Linked,
            notes: None,
        }
    }
}
