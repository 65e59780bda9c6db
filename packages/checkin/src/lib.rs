//! Event check-in verification and reconciliation.
//!
//! A display mints short-lived signed tokens for one event instance;
//! scanners present them to record attendance, either as an authenticated
//! member or through an anonymous public form. Anonymous claims that can't
//! be matched to the member directory are kept as unverified and later
//! reconciled by an operator.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use checkin::{CheckInService, MemoryStore, SigningSecret, TokenService};
//!
//! let tokens = TokenService::new(SigningSecret::new(secret_bytes)?);
//! let service = CheckInService::new(Arc::new(MemoryStore::new()), tokens);
//!
//! let token = service.issue_rotating_token(event_id);
//! let record = service.check_in_via_token(&session, &token.encoded).await?;
//! ```
//!
//! # Modules
//!
//! - [`token`] - HMAC-signed check-in tokens
//! - [`service`] - check-in, public intake and reconciliation
//! - [`traits`] - storage and directory abstractions
//! - [`stores`] - `MemoryStore`, and `PostgresStore` behind the `postgres` feature

pub mod error;
pub mod id;
pub mod secret;
pub mod service;
pub mod stores;
pub mod token;
pub mod traits;
pub mod types;

pub use error::{CheckInError, PublicError, Result, TokenError};
pub use id::{AccountId, AttendanceId, EventInstanceId, Id, MemberId};
pub use secret::SigningSecret;
pub use service::{classify_claim, CheckInService, Classification, PublicSubmission};
pub use stores::MemoryStore;
pub use token::{
    CheckInToken, TokenKind, TokenPayload, TokenService, ROTATING_REFRESH_SECS,
    ROTATING_TOKEN_TTL_MS, STATIC_TOKEN_TTL_MS,
};
pub use traits::{AttendanceStore, CheckInStore, MemberDirectory};
pub use types::{
    AttendanceRecord, AttendeeCategory, CheckInMethod, DirectoryMember, LinkStatus,
    NewAttendance, NewMember, SessionIdentity,
};

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
