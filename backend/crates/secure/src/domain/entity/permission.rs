//! Resolved permissions

use serde::Serialize;

/// Permission reachable by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionInfo {
    pub name: String,
    pub number: i32,
    pub description: String,
}

/// Axis a permission-number list is cached on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `spn:<service>:<user-id>`
    Service,
    /// `ipn:<instance>:<user-id>`
    Instance,
}

impl Scope {
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Service => "spn",
            Self::Instance => "ipn",
        }
    }
}
