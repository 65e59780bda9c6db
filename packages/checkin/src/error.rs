//! Typed errors for check-in, intake and reconciliation.
//!
//! Token failures keep their detail here. Anonymous callers only ever see
//! [`PublicError`], which folds every token failure into `InvalidToken`.

use thiserror::Error;

use crate::id::{AttendanceId, EventInstanceId, MemberId};

/// Why a check-in token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not base64, not the expected JSON envelope, or a non-canonical signature.
    #[error("token malformed: {0}")]
    Malformed(String),

    #[error("token signature mismatch")]
    SignatureMismatch,

    #[error("token expired")]
    Expired,
}

/// Errors raised by the check-in engine.
#[derive(Debug, Error)]
pub enum CheckInError {
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The `(member, event)` pair already has an attendance record.
    #[error("member {member_id} is already checked in to event {event_instance_id}")]
    DuplicateCheckIn {
        member_id: MemberId,
        event_instance_id: EventInstanceId,
    },

    #[error("session is not linked to a member profile")]
    NotLinkedToMember,

    #[error("attendance record not found: {0}")]
    RecordNotFound(AttendanceId),

    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    /// Linking would give the member a second record for the same event.
    #[error("member {member_id} already has attendance {existing} for this event")]
    ConflictingAttendance {
        member_id: MemberId,
        existing: AttendanceId,
    },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Backend failure. The only retryable variant.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CheckInError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage(err.into())
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Token(TokenError::Malformed(_)) => "TOKEN_MALFORMED",
            Self::Token(TokenError::SignatureMismatch) => "TOKEN_SIGNATURE_MISMATCH",
            Self::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            Self::DuplicateCheckIn { .. } => "DUPLICATE_CHECK_IN",
            Self::NotLinkedToMember => "NOT_LINKED_TO_MEMBER",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::MemberNotFound(_) => "MEMBER_NOT_FOUND",
            Self::ConflictingAttendance { .. } => "CONFLICTING_ATTENDANCE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Collapse into the error shape shown to untrusted callers.
    pub fn into_public(self) -> PublicError {
        match self {
            Self::Token(_) => PublicError::InvalidToken,
            Self::InvalidInput { reason } => PublicError::InvalidInput { reason },
            Self::Storage(_) => PublicError::Unavailable,
            // Intake resolves duplicates itself; anything else is not the caller's business.
            _ => PublicError::Rejected,
        }
    }
}

/// Errors reported to anonymous public-intake callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublicError {
    #[error("invalid check-in code")]
    InvalidToken,

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("check-in could not be recorded")]
    Rejected,

    #[error("service temporarily unavailable")]
    Unavailable,
}

impl From<CheckInError> for PublicError {
    fn from(err: CheckInError) -> Self {
        err.into_public()
    }
}

pub type Result<T> = std::result::Result<T, CheckInError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_collapse_for_public_callers() {
        for err in [
            TokenError::Malformed("bad base64".into()),
            TokenError::SignatureMismatch,
            TokenError::Expired,
        ] {
            assert_eq!(
                CheckInError::from(err).into_public(),
                PublicError::InvalidToken
            );
        }
    }

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(CheckInError::storage("connection reset").is_retryable());
        assert!(!CheckInError::NotLinkedToMember.is_retryable());
        assert!(!CheckInError::Token(TokenError::Expired).is_retryable());
    }

    #[test]
    fn test_codes_keep_token_detail_internally() {
        assert_eq!(
            CheckInError::from(TokenError::Expired).code(),
            "TOKEN_EXPIRED"
        );
        assert_eq!(
            CheckInError::from(TokenError::SignatureMismatch).code(),
            "TOKEN_SIGNATURE_MISMATCH"
        );
    }
}
