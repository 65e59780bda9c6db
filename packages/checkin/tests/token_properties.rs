//! Tamper and expiry behaviour of encoded tokens.

use chrono::{Duration, Utc};
use checkin::{EventInstanceId, SigningSecret, TokenError, TokenService, ROTATING_TOKEN_TTL_MS};

fn service() -> TokenService {
    TokenService::new(SigningSecret::new("token-properties-secret-0123456789abcdef").unwrap())
}

#[test]
fn test_every_single_byte_flip_is_rejected() {
    let tokens = service();
    let now = Utc::now();
    let token = tokens.issue_at(EventInstanceId::new(), ROTATING_TOKEN_TTL_MS, now);
    let original = token.encoded.as_bytes().to_vec();

    for i in 0..original.len() {
        for mask in [0x01u8, 0x02, 0x20, 0x80] {
            let mut flipped = original.clone();
            flipped[i] ^= mask;
            let candidate = String::from_utf8_lossy(&flipped).into_owned();

            match tokens.validate_at(&candidate, now) {
                Err(TokenError::Malformed(_)) | Err(TokenError::SignatureMismatch) => {}
                other => panic!("byte {} mask {:#04x} accepted: {:?}", i, mask, other),
            }
        }
    }
}

#[test]
fn test_many_events_round_trip() {
    let tokens = service();
    for _ in 0..50 {
        let event = EventInstanceId::new();
        let payload = tokens.validate(&tokens.issue_rotating(event).encoded).unwrap();
        assert_eq!(payload.event_instance_id, event);
    }
}

#[test]
fn test_static_token_survives_the_day_but_not_longer() {
    let tokens = service();
    let now = Utc::now();
    let event = EventInstanceId::new();
    let token = tokens.issue_at(event, checkin::STATIC_TOKEN_TTL_MS, now);

    assert!(tokens
        .validate_at(&token.encoded, now + Duration::hours(23))
        .is_ok());
    assert_eq!(
        tokens.validate_at(&token.encoded, now + Duration::hours(24) + Duration::milliseconds(1)),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_rotating_token_rejected_one_ms_past_expiry() {
    let tokens = service();
    let now = Utc::now();
    let token = tokens.issue_at(EventInstanceId::new(), ROTATING_TOKEN_TTL_MS, now);
    let at = now + Duration::milliseconds(ROTATING_TOKEN_TTL_MS + 1);

    assert_eq!(tokens.validate_at(&token.encoded, at), Err(TokenError::Expired));
}

#[test]
fn test_secret_change_invalidates_outstanding_tokens() {
    let before = service();
    let token = before.issue_static(EventInstanceId::new());

    let after_restart =
        TokenService::new(SigningSecret::new("rotated-secret-after-restart-0123456789").unwrap());
    assert_eq!(
        after_restart.validate(&token.encoded),
        Err(TokenError::SignatureMismatch)
    );
}
