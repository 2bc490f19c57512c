//! Bearer token authentication
//!
//! Optional: anonymous requests pass through, a valid token adds an
//! [`AuthContext`] to the request extensions, anything else is refused.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use erp_shared::auth::middleware::{authenticate, AuthContext};
use erp_shared::data::DataBackend;
use tracing::debug;

use crate::{app::AppState, error::ApiResult};

/// Validates the bearer token, if any, and records the caller
///
/// # Errors
///
/// 400 for a malformed `Authorization` header, 401 for an invalid or
/// expired token.
pub async fn authenticate_request<B: DataBackend>(
    State(state): State<AppState<B>>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(auth) = authenticate(req.headers(), &state.config.jwt.secret)? {
        debug!(user_id = %auth.user_id, "Request authenticated");
        req.extensions_mut().insert::<AuthContext>(auth);
    }
    Ok(next.run(req).await)
}
