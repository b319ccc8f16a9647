//! Time-to-live for cache entries

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ttl must be non-negative (got {0}s)")]
pub struct NegativeTtl(pub i64);

/// Non-negative lifetime of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ttl(Duration);

impl Ttl {
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn from_secs(secs: i64) -> Result<Self, NegativeTtl> {
        u64::try_from(secs)
            .map(|s| Self(Duration::from_secs(s)))
            .map_err(|_| NegativeTtl(secs))
    }

    #[inline]
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// Milliseconds, saturating at `u64::MAX`
    #[inline]
    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative() {
        assert_eq!(Ttl::from_secs(-1), Err(NegativeTtl(-1)));
        assert_eq!(Ttl::from_secs(0).unwrap().as_secs(), 0);
        assert_eq!(Ttl::from_secs(90).unwrap().as_millis(), 90_000);
    }

    #[test]
    fn test_sub_second() {
        let ttl = Ttl::new(Duration::from_millis(250));
        assert_eq!(ttl.as_secs(), 0);
        assert_eq!(ttl.as_millis(), 250);
        assert!(!ttl.is_zero());
    }
}
