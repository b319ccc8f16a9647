//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod router;

pub use handlers::{CurrentUser, SecureAppState};
pub use middleware::{recover, require_root, require_session};
pub use registry::{RouteError, RouteRegistry};
pub use router::secure_router;
