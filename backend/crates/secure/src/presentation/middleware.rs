//! Secure Middleware
//!
//! Bearer-session gate, root-only gate, and panic recovery.

use std::any::Any;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use kernel::error::messages::service;
use platform::credentials::extract_bearer_token;

use crate::application::CheckSessionUseCase;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::presentation::handlers::{CurrentUser, SecureAppState};

/// Middleware that requires a live bearer session
///
/// On success the owner is stored as a [`CurrentUser`] request extension.
pub async fn require_session<P, M>(
    State(state): State<SecureAppState<P, M>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let Ok(token) = extract_bearer_token(req.headers()) else {
        return AppError::service(service::UNAUTHORIZED).into_response();
    };

    let use_case = CheckSessionUseCase::new(state.joint.clone());
    let user_id = match use_case.execute(&token).await {
        Ok(user_id) => user_id,
        Err(e) if e.is_empty_result() => {
            return AppError::service(service::UNAUTHORIZED).into_response();
        }
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(CurrentUser { user_id });
    next.run(req).await
}

/// Middleware that admits the root account only; runs after [`require_session`]
pub async fn require_root<P, M>(
    State(state): State<SecureAppState<P, M>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let is_root = req
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|user| user.user_id == state.root_user_id);

    if !is_root {
        return AppError::service(service::ACCESS_DENIED).into_response();
    }
    next.run(req).await
}

/// Panic handler for `CatchPanicLayer`
pub fn recover(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    tracing::error!(origin = "recovery middleware", panic = detail, "Handler panicked");

    let body = serde_json::json!({ "error": "internal server error" });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
