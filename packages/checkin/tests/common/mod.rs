//! Shared setup for check-in integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use checkin::{
    AttendeeCategory, CheckInService, EventInstanceId, MemoryStore, PublicSubmission,
    SigningSecret, TokenService,
};

pub const TEST_SECRET: &str = "integration-test-signing-secret-0123456789";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub service: CheckInService,
    pub event: EventInstanceId,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenService::new(SigningSecret::new(TEST_SECRET).unwrap());
        let service = CheckInService::new(store.clone(), tokens);
        Self {
            store,
            service,
            event: EventInstanceId::new(),
        }
    }

    pub fn token(&self) -> String {
        self.service.issue_rotating_token(self.event).encoded
    }

    pub fn submission(&self, name: &str, phone: Option<&str>, category: AttendeeCategory) -> PublicSubmission {
        PublicSubmission {
            token: self.token(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            category,
            notes: None,
        }
    }
}

#[cfg(feature = "postgres")]
pub mod postgres;
