//! Permission Number Value Object
//!
//! Dense per-service index of a permission, starting at 1. Lists of numbers
//! handed out by the service are always sorted ascending without duplicates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("permission number must be positive (got {0})")]
pub struct InvalidPermissionNumber(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionNumber(i32);

impl PermissionNumber {
    pub fn new(value: i32) -> Result<Self, InvalidPermissionNumber> {
        if value >= 1 {
            Ok(Self(value))
        } else {
            Err(InvalidPermissionNumber(value.into()))
        }
    }

    #[inline]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for PermissionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sorted, de-duplicated list of permission numbers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct PermissionNumbers(Vec<i32>);

impl PermissionNumbers {
    pub fn from_unsorted(mut numbers: Vec<i32>) -> Self {
        numbers.sort_unstable();
        numbers.dedup();
        Self(numbers)
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, number: i32) -> bool {
        self.0.binary_search(&number).is_ok()
    }
}
