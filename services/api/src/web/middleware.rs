//! services/api/src/web/middleware.rs
//!
//! Caller identity for the protected routes.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's user id, inserted into request extensions by [`require_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Middleware that reads the `x-user-id` header set by the upstream gateway.
///
/// If present and non-blank, inserts a [`UserId`] for handlers to use.
/// Otherwise returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            warn!("Rejected request without {} header", USER_ID_HEADER);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
