//! In-process test harness: the real router over a `MemoryStore`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use checkin::{AccountId, CheckInService, EventInstanceId, MemberId, MemoryStore, SigningSecret, TokenService};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use server_core::server::auth::{Claims, JwtService};
use server_core::server::{build_app, AppState};
use tower::ServiceExt;
use uuid::Uuid;

const TEST_SIGNING_SECRET: &str = "server-test-signing-secret-0123456789";
const TEST_JWT_SECRET: &str = "server-test-jwt-secret";
const TEST_JWT_ISSUER: &str = "checkin";

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub service: CheckInService,
    pub app: Router,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let secret = SigningSecret::new(TEST_SIGNING_SECRET).expect("test secret is long enough");
        let service = CheckInService::new(store.clone(), TokenService::new(secret));
        let jwt = Arc::new(JwtService::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string()));

        let app = build_app(
            AppState {
                service: service.clone(),
                jwt_service: jwt.clone(),
            },
            &[],
            // oneshot requests carry no peer address for the limiter
            false,
        );

        Self {
            store,
            service,
            app,
        }
    }

    /// Session as the identity service would issue it.
    fn session(&self, member_id: Option<MemberId>, is_admin: bool) -> String {
        let account_id = AccountId::new();
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            account_id: account_id.into_uuid(),
            member_id: member_id.map(MemberId::into_uuid),
            is_admin,
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
            iss: TEST_JWT_ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("Failed to create session token")
    }

    pub fn admin_token(&self) -> String {
        self.session(None, true)
    }

    pub fn member_token(&self, member_id: MemberId) -> String {
        self.session(Some(member_id), false)
    }

    /// Session for an account with no directory profile.
    pub fn account_token(&self) -> String {
        self.session(None, false)
    }

    pub fn check_in_token(&self, event: EventInstanceId) -> String {
        self.service.issue_rotating_token(event).encoded
    }

    /// Send one request through the router and decode the JSON reply.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, bearer, Some(body)).await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, bearer, None).await
    }
}
