//! Signed, time-boxed check-in tokens.
//!
//! Wire form: base64url (no padding) of
//! `{"payload":{...},"signature":"<hex hmac-sha256>"}`. The signature covers
//! the payload bytes exactly as they appear in the envelope, so any edit to
//! the payload text breaks it. Verification is stateless.
//!
//! The payload carries a nonce but nothing records spent nonces. A kiosk
//! code is scanned by many phones inside its window, so single-use would
//! admit only the first scanner; the short rotation window bounds replay
//! instead. The nonce is kept so single-use can later be switched on for
//! the day-long static variant.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::error::TokenError;
use crate::id::EventInstanceId;
use crate::secret::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a rotating (kiosk screen) token.
pub const ROTATING_TOKEN_TTL_MS: i64 = 60_000;

/// How often a kiosk should mint a fresh rotating token.
pub const ROTATING_REFRESH_SECS: u64 = 55;

/// Lifetime of a static (printed) token.
pub const STATIC_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "ATTEND")]
    Attend,
}

/// What a token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenPayload {
    pub kind: TokenKind,
    pub event_instance_id: EventInstanceId,
    pub expires_at_epoch_ms: i64,
    /// Reserved for single-use enforcement. Not checked.
    pub nonce: Uuid,
}

impl TokenPayload {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at_epoch_ms).single()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    payload: Box<RawValue>,
    signature: String,
}

/// A freshly minted token. Never persisted.
#[derive(Debug, Clone)]
pub struct CheckInToken {
    pub payload: TokenPayload,
    pub signature: String,
    /// The string to put in the QR code or URL.
    pub encoded: String,
}

/// Mints and verifies check-in tokens with one process-wide secret.
#[derive(Debug)]
pub struct TokenService {
    secret: SigningSecret,
}

impl TokenService {
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    /// Token for a display that re-mints roughly every [`ROTATING_REFRESH_SECS`].
    pub fn issue_rotating(&self, event_instance_id: EventInstanceId) -> CheckInToken {
        self.issue_at(event_instance_id, ROTATING_TOKEN_TTL_MS, Utc::now())
    }

    /// Token for a printed code valid for a whole day.
    pub fn issue_static(&self, event_instance_id: EventInstanceId) -> CheckInToken {
        self.issue_at(event_instance_id, STATIC_TOKEN_TTL_MS, Utc::now())
    }

    /// Mint a token that expires `ttl_ms` after `now`.
    pub fn issue_at(
        &self,
        event_instance_id: EventInstanceId,
        ttl_ms: i64,
        now: DateTime<Utc>,
    ) -> CheckInToken {
        let payload = TokenPayload {
            kind: TokenKind::Attend,
            event_instance_id,
            expires_at_epoch_ms: now.timestamp_millis() + ttl_ms,
            nonce: Uuid::new_v4(),
        };

        let payload_json = serde_json::to_string(&payload)
            .expect("token payload is plain data and always serializes");
        let signature = hex::encode(self.sign(payload_json.as_bytes()));
        let envelope = Envelope {
            payload: RawValue::from_string(payload_json)
                .expect("serde_json output is valid JSON"),
            signature: signature.clone(),
        };
        let envelope_json =
            serde_json::to_vec(&envelope).expect("token envelope always serializes");

        debug!(
            event_instance_id = %event_instance_id,
            expires_at_epoch_ms = payload.expires_at_epoch_ms,
            "Issued check-in token"
        );

        CheckInToken {
            payload,
            signature,
            encoded: URL_SAFE_NO_PAD.encode(envelope_json),
        }
    }

    /// Verify a token against the current time.
    pub fn validate(&self, encoded: &str) -> Result<TokenPayload, TokenError> {
        self.validate_at(encoded, Utc::now())
    }

    /// Verify a token as of `now`.
    ///
    /// Signature is checked before the payload is parsed, and expiry last.
    pub fn validate_at(&self, encoded: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| TokenError::Malformed(format!("base64: {}", e)))?;

        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|e| TokenError::Malformed(format!("envelope: {}", e)))?;

        // Uppercase hex decodes to the same bytes; only the canonical form is accepted.
        if !envelope
            .signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(TokenError::Malformed("signature is not lowercase hex".into()));
        }
        let signature = hex::decode(&envelope.signature)
            .map_err(|e| TokenError::Malformed(format!("signature: {}", e)))?;

        let mut mac = self.mac();
        mac.update(envelope.payload.get().as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::SignatureMismatch)?;

        let payload: TokenPayload = serde_json::from_str(envelope.payload.get())
            .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;

        if now.timestamp_millis() >= payload.expires_at_epoch_ms {
            return Err(TokenError::Expired);
        }

        Ok(payload)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose()).expect("HMAC can take key of any size")
    }
}
