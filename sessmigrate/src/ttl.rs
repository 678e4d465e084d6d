//! Absolute expiry to relative TTL conversion.
//!
//! Every conversion in a run is made against the same `now`, captured once
//! when the run starts.

use std::fmt;
use std::num::NonZeroU64;

use chrono::{DateTime, Utc};

/// Relative time-to-live in whole seconds. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    /// Builds a TTL from a second count, rejecting zero.
    pub fn from_secs(secs: u64) -> Option<Self> {
        NonZeroU64::new(secs).map(Self)
    }

    pub fn as_secs(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// The record has expired, or expires within the current second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skip {
    /// The computed, non-positive TTL.
    pub ttl_secs: i64,
}

/// Computes `floor(expire_at - now)` in seconds.
pub fn convert(expire_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<Ttl, Skip> {
    let delta = expire_at.signed_duration_since(now);
    let ttl_secs = delta.num_milliseconds().div_euclid(1000);
    if ttl_secs <= 0 {
        return Err(Skip { ttl_secs });
    }
    Ttl::from_secs(ttl_secs as u64).ok_or(Skip { ttl_secs })
}
