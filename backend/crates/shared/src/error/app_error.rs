//! Application Error - Unified error type for every layer
//!
//! Defines [`AppError`] struct and [`AppResult<T>`] type alias.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::Location;

use super::kind::ErrorKind;
use super::messages;

/// Layered application error
///
/// Carries the producing layer, a human message, the origin (the call site
/// where the error was produced or last adapted) and an optional cause.
///
/// ## Fields
/// * `kind` - Layer that produced the error
/// * `message` - Human readable message, part of the adapter contract
/// * `origin` - Call site captured with `#[track_caller]`
/// * `source` - Wrapped lower-level error
///
/// ## Examples
/// ```rust
/// use kernel::error::{app_error::AppError, kind::ErrorKind};
///
/// let err = AppError::joint("empty result");
/// assert_eq!(err.kind(), ErrorKind::Joint);
/// assert!(err.to_string().starts_with("joint err: empty result. Initial err: none. Origin: "));
/// ```
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    origin: &'static Location<'static>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// Result alias used across layers
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a new error whose origin is the caller
    #[inline]
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(kind, message, Location::caller())
    }

    /// Create a new error with an explicit origin
    ///
    /// Used by helpers that capture the location before entering a closure.
    #[inline]
    pub fn at(
        kind: ErrorKind,
        message: impl Into<Cow<'static, str>>,
        origin: &'static Location<'static>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            origin,
            source: None,
        }
    }

    #[inline]
    #[track_caller]
    pub fn persistent(message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(ErrorKind::Persistent, message, Location::caller())
    }

    #[inline]
    #[track_caller]
    pub fn in_memory(message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(ErrorKind::InMemory, message, Location::caller())
    }

    #[inline]
    #[track_caller]
    pub fn joint(message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(ErrorKind::Joint, message, Location::caller())
    }

    #[inline]
    #[track_caller]
    pub fn service(message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(ErrorKind::Service, message, Location::caller())
    }

    #[inline]
    #[track_caller]
    pub fn broker(message: impl Into<Cow<'static, str>>) -> Self {
        Self::at(ErrorKind::Broker, message, Location::caller())
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Attach the original error
    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Call site where this error was produced or adapted
    #[inline]
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// True if the error has the given kind and message
    #[inline]
    pub fn is(&self, kind: ErrorKind, message: &str) -> bool {
        self.kind == kind && self.message == message
    }

    /// True if a lookup found nothing, in any layer's vocabulary
    pub fn is_empty_result(&self) -> bool {
        match self.kind {
            ErrorKind::Persistent => self.message == messages::persistent::NO_ROWS,
            ErrorKind::InMemory => self.message == messages::in_memory::EMPTY_RESULT,
            ErrorKind::Joint => self.message == messages::joint::EMPTY_RESULT,
            ErrorKind::Service => self.message == messages::service::EMPTY_RESULT,
            ErrorKind::Broker => false,
        }
    }

    /// HTTP status the transport should answer with
    ///
    /// Only service errors carry client-facing meaning; everything that
    /// escaped a lower layer unadapted is an internal error.
    pub fn status_code(&self) -> u16 {
        use messages::service::*;

        if self.kind != ErrorKind::Service {
            return 500;
        }
        match self.message.as_ref() {
            INCORRECT_CREDENTIALS | ACCOUNT_NOT_ACTIVE | UNAUTHORIZED | ERROR_LOGOUT => 401,
            ACCESS_DENIED => 403,
            EMPTY_RESULT | NOTHING_CHANGED => 404,
            ALREADY_EXISTS => 409,
            INVALID_ARGUMENT => 400,
            _ => 500,
        }
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    #[inline]
    pub fn is_client_error(&self) -> bool {
        let code = self.status_code();
        (400..500).contains(&code)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder.field("kind", &self.kind);
        builder.field("message", &self.message);
        builder.field("origin", &format_args!("{}", self.origin));
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} err: {}. Initial err: ", self.kind, self.message)?;
        match &self.source {
            Some(source) => write!(f, "{source}")?,
            None => f.write_str("none")?,
        }
        write!(f, ". Origin: {}", self.origin)
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}
