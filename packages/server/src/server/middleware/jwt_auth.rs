use crate::server::auth::JwtService;
use axum::{middleware::Next, response::Response};
use checkin::{AccountId, MemberId, SessionIdentity};
use std::sync::Arc;
use tracing::debug;

/// Authenticated caller information from the session JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub account_id: AccountId,
    pub member_id: Option<MemberId>,
    pub is_admin: bool,
}

impl AuthUser {
    /// Identity handed to the check-in service. Admin status is not part of it.
    pub fn session(&self) -> SessionIdentity {
        SessionIdentity {
            account_id: self.account_id,
            member_id: self.member_id,
        }
    }
}

/// JWT authentication middleware
///
/// Extracts JWT token from Authorization header, verifies it, and adds AuthUser to request extensions.
/// If no token or invalid token, request continues without AuthUser (public access).
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, &jwt_service);

    if let Some(user) = auth_user {
        debug!(
            account_id = %user.account_id,
            is_admin = user.is_admin,
            "Authenticated session"
        );
        request.extensions_mut().insert(user);
    } else {
        debug!("No valid authentication token");
    }

    next.run(request).await
}

/// Extract and verify JWT token from request
fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Extract token (handle both "Bearer <token>" and raw token)
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = jwt_service.verify_token(token).ok()?;

    Some(AuthUser {
        account_id: AccountId::from_uuid(claims.account_id),
        member_id: claims.member_id.map(MemberId::from_uuid),
        is_admin: claims.is_admin,
    })
}
