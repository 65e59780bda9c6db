//! Signing secret with secure memory.
//!
//! Loaded once at startup and handed to [`crate::token::TokenService`].
//! Swapping it means restarting the process; tokens signed under the old
//! secret stop verifying.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

use crate::error::{CheckInError, Result};

/// Shortest secret accepted for HMAC-SHA256 signing.
pub const MIN_SECRET_LEN: usize = 32;

/// HMAC key for check-in tokens. Never printed.
pub struct SigningSecret(SecretBox<[u8]>);

impl SigningSecret {
    /// Wrap raw key bytes, rejecting keys shorter than [`MIN_SECRET_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CheckInError::invalid_input(format!(
                "signing secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self(SecretBox::new(bytes.into_boxed_slice())))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}
