use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AccountId, MemberId};

/// A member as seen through the directory boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryMember {
    pub id: MemberId,
    pub full_name: String,
    pub phone: Option<String>,
    /// Contact email of the member's linked account, if any.
    pub contact_email: Option<String>,
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a member minted during reconciliation.
///
/// Blank fields fall back to the attendance record's visitor name and phone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMember {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub contact_email: Option<String>,
}

impl NewMember {
    /// Resolve into a directory row, filling gaps from the visitor's own submission.
    pub fn into_member(
        self,
        visitor_name: Option<&str>,
        visitor_phone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<DirectoryMember> {
        let full_name = non_blank(self.full_name).or_else(|| non_blank(visitor_name.map(str::to_string)))?;

        Some(DirectoryMember {
            id: MemberId::new(),
            full_name,
            phone: non_blank(self.phone).or_else(|| non_blank(visitor_phone.map(str::to_string))),
            contact_email: non_blank(self.contact_email),
            account_id: None,
            created_at: now,
        })
    }
}

/// Trim, and turn empty strings into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Who is calling an authenticated check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub account_id: AccountId,
    /// Member link carried by the session itself, when the issuer knows it.
    pub member_id: Option<MemberId>,
}
