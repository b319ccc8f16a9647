//! Error conversions - third-party errors into the layered vocabulary
//!
//! Conversions are exposed as `#[track_caller]` extension methods rather than
//! `From` impls so that `origin` points at the storage call, not at the `?`
//! desugaring.

#[cfg(feature = "sqlx")]
pub use self::sqlx_conv::{PersistentResultExt, from_sqlx};

// ============================================================================
// SQLx conversions (feature-gated)
// ============================================================================

#[cfg(feature = "sqlx")]
mod sqlx_conv {
    use std::panic::Location;

    use crate::error::app_error::{AppError, AppResult};
    use crate::error::kind::ErrorKind;
    use crate::error::messages::persistent;

    /// PostgreSQL unique_violation
    const UNIQUE_VIOLATION: &str = "23505";

    /// Map a sqlx error into the persistent vocabulary
    pub fn from_sqlx(err: sqlx::Error, origin: &'static Location<'static>) -> AppError {
        let message = match &err {
            sqlx::Error::RowNotFound => persistent::NO_ROWS,
            sqlx::Error::PoolTimedOut => persistent::POOL_TIMED_OUT,
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                    || db_err.message().starts_with(persistent::DUPLICATE_KEY) =>
            {
                persistent::DUPLICATE_KEY
            }
            _ => persistent::DATABASE_ERROR,
        };
        AppError::at(ErrorKind::Persistent, message, origin).with_source(err)
    }

    /// `Result<T, sqlx::Error>` to persistent `AppResult<T>`
    pub trait PersistentResultExt<T> {
        fn persistent_err(self) -> AppResult<T>;
    }

    impl<T> PersistentResultExt<T> for Result<T, sqlx::Error> {
        #[track_caller]
        fn persistent_err(self) -> AppResult<T> {
            let origin = Location::caller();
            self.map_err(|e| from_sqlx(e, origin))
        }
    }

}

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for super::app_error::AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, "Internal error");
            let body = serde_json::json!({ "error": "internal server error" });
            return (status, Json(body)).into_response();
        }

        // Authentication failures get a uniform, body-less answer
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(error = %self, "Authentication failed");
            return status.into_response();
        }

        tracing::debug!(error = %self, "Client error");
        let body = serde_json::json!({ "error": self.message() });
        (status, Json(body)).into_response()
    }
}
