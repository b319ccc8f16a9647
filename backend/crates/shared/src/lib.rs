//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" of the secure service vocabulary:
//! - The layered error type (persistent, in-memory, joint, service, broker)
//! - Cross-layer error adapters and the well-known message vocabulary
//! - Typed UUID identifiers
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all layers.

pub mod error {
    pub mod adapter;
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
    pub mod messages;
}
pub mod id;
