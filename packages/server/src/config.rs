use anyhow::{Context, Result};
use checkin::SigningSecret;
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// HMAC key for check-in tokens. Read once at startup.
    pub checkin_signing_secret: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub rate_limit_public: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            checkin_signing_secret: env::var("CHECKIN_SIGNING_SECRET")
                .context("CHECKIN_SIGNING_SECRET must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "checkin".to_string()),
            allowed_origins: parse_origins(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
            rate_limit_public: env::var("RATE_LIMIT_PUBLIC")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }

    /// Wrap the signing secret for the token service.
    pub fn signing_secret(&self) -> Result<SigningSecret> {
        SigningSecret::new(self.checkin_signing_secret.as_bytes())
            .context("CHECKIN_SIGNING_SECRET is too short")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
