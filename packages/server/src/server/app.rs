//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use checkin::CheckInService;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::server::auth::JwtService;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    check_in_handler, create_member_handler, event_attendance_handler, health_handler,
    issue_rotating_token_handler, issue_static_token_handler, link_attendance_handler,
    manual_check_in_handler, member_attendance_handler, public_check_in_handler,
    unreconciled_attendance_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: CheckInService,
    pub jwt_service: Arc<JwtService>,
}

/// CORS: any origin when none are configured, otherwise the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Anonymous intake routes, optionally behind a per-IP rate limit.
///
/// The limiter keys on the peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` when it is on.
fn public_routes(rate_limit: bool) -> Router {
    let router = Router::new().route("/public/check-ins", post(public_check_in_handler));
    if !rate_limit {
        return router;
    }

    // Per IP: 2 requests per second, bursts of 10
    match GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .use_headers()
        .finish()
    {
        Some(config) => router.layer(GovernorLayer {
            config: Arc::new(config),
        }),
        None => {
            warn!("Rate limiter configuration rejected, public routes are unlimited");
            router
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String], rate_limit_public: bool) -> Router {
    let jwt_service_for_middleware = state.jwt_service.clone();

    Router::new()
        .route("/health", get(health_handler))
        // Operator token minting
        .route(
            "/events/:event_id/tokens/rotating",
            post(issue_rotating_token_handler),
        )
        .route(
            "/events/:event_id/tokens/static",
            post(issue_static_token_handler),
        )
        // Check-in
        .route("/check-ins", post(check_in_handler))
        .route("/check-ins/manual", post(manual_check_in_handler))
        .merge(public_routes(rate_limit_public))
        // Listings and reconciliation
        .route("/events/:event_id/attendance", get(event_attendance_handler))
        .route(
            "/events/:event_id/attendance/unreconciled",
            get(unreconciled_attendance_handler),
        )
        .route(
            "/members/:member_id/attendance",
            get(member_attendance_handler),
        )
        .route("/attendance/:id/link", post(link_attendance_handler))
        .route("/attendance/:id/create-member", post(create_member_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service_for_middleware.clone(), req, next)
        }))
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
