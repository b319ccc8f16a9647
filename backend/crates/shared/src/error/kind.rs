//! Error Kind - Classification of errors by the layer that produced them
//!
//! Defines the [`ErrorKind`] enum. Each layer surfaces only its own kind
//! outward; lower kinds are remapped or wrapped by the receiving layer's
//! adapter (see [`crate::error::adapter`]).

use serde::Serialize;

/// Layer that produced an error
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// assert_eq!(ErrorKind::InMemory.as_str(), "in-memory");
/// assert_eq!(ErrorKind::Persistent.to_string(), "persistent");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Authoritative SQL store
    Persistent,
    /// Hot key/value cache
    InMemory,
    /// Facade composing the in-memory and persistent stores
    Joint,
    /// Authentication / authorization use cases
    Service,
    /// Pub/sub producer
    Broker,
}

impl ErrorKind {
    /// Stable textual name used in formatted errors
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Persistent => "persistent",
            ErrorKind::InMemory => "in-memory",
            ErrorKind::Joint => "joint",
            ErrorKind::Service => "service",
            ErrorKind::Broker => "broker",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
