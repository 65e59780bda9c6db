//! Member directory boundary.
//!
//! The directory (members, households, accounts) is owned elsewhere. The
//! check-in engine only reads it, plus one write inside
//! [`crate::traits::store::AttendanceStore::create_member_and_link`].

use async_trait::async_trait;

use crate::error::Result;
use crate::id::{AccountId, MemberId};
use crate::types::DirectoryMember;

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_member(&self, id: MemberId) -> Result<Option<DirectoryMember>>;

    /// Exact match on the stored phone number.
    ///
    /// `None` when no member or more than one member holds the number; a
    /// shared household phone is not an identity.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryMember>>;

    /// Exact match on a linked account's contact email. `None` when ambiguous.
    async fn find_by_contact_email(&self, email: &str) -> Result<Option<DirectoryMember>>;

    /// Member profile linked to a login account, if any.
    async fn member_for_account(&self, account_id: AccountId) -> Result<Option<MemberId>>;
}
