// HTTP routes
pub mod attendance;
pub mod check_ins;
pub mod health;
pub mod tokens;

pub use attendance::*;
pub use check_ins::*;
pub use health::*;
pub use tokens::*;

use axum::extract::Extension;

use crate::server::middleware::AuthUser;
use crate::server::ApiError;

/// Any valid session.
fn require_session(auth: Option<Extension<AuthUser>>) -> Result<AuthUser, ApiError> {
    auth.map(|Extension(user)| user).ok_or(ApiError::Unauthorized)
}

/// A valid session with the admin flag.
fn require_admin(auth: Option<Extension<AuthUser>>) -> Result<AuthUser, ApiError> {
    let user = require_session(auth)?;
    if !user.is_admin {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}
