//! Route registry
//!
//! Append-only list of the routes mounted on a router. Registering the
//! same method and path twice is an error rather than a silent override.

use axum::http::Method;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },
}

#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<(Method, String)>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, path: &str) -> Result<(), RouteError> {
        if self.contains(&method, path) {
            return Err(RouteError::Duplicate {
                method,
                path: path.to_string(),
            });
        }
        self.routes.push((method, path.to_string()));
        Ok(())
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.routes.iter().any(|(m, p)| m == method && p == path)
    }

    pub fn routes(&self) -> &[(Method, String)] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
