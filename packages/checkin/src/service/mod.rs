//! The check-in engine.
//!
//! One [`CheckInService`] serves every request. It holds the token signer
//! and a shared store; neither needs locking at this level.

use std::sync::Arc;

use crate::error::Result;
use crate::id::{EventInstanceId, MemberId};
use crate::token::{CheckInToken, TokenService};
use crate::traits::CheckInStore;
use crate::types::AttendanceRecord;

mod checkin;
mod intake;
mod reconcile;

pub use intake::{classify_claim, Classification, PublicSubmission};

#[derive(Clone)]
pub struct CheckInService {
    store: Arc<dyn CheckInStore>,
    tokens: Arc<TokenService>,
}

impl CheckInService {
    pub fn new(store: Arc<dyn CheckInStore>, tokens: TokenService) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn issue_rotating_token(&self, event_instance_id: EventInstanceId) -> CheckInToken {
        self.tokens.issue_rotating(event_instance_id)
    }

    pub fn issue_static_token(&self, event_instance_id: EventInstanceId) -> CheckInToken {
        self.tokens.issue_static(event_instance_id)
    }

    pub async fn attendance_for_event(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<AttendanceRecord>> {
        self.store.list_for_event(event_instance_id).await
    }

    pub async fn attendance_for_member(&self, member_id: MemberId) -> Result<Vec<AttendanceRecord>> {
        self.store.list_for_member(member_id).await
    }

    /// Visitor and claimed-unverified records still waiting for an operator.
    pub async fn unreconciled_for_event(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<AttendanceRecord>> {
        self.store.list_unreconciled(event_instance_id).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
