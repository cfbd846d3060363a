//! Follower bands and the pool keys built from them.
//!
//! A [`FollowerBand`] is a relative range around an account's follower count.
//! Smaller accounts get wider relative bands:
//!
//! | followers   | low  | high |
//! |-------------|------|------|
//! | < 1 000     | 0.3× | 5.0× |
//! | 1 000–4 999 | 0.4× | 3.0× |
//! | 5 000–9 999 | 0.5× | 2.5× |
//! | ≥ 10 000    | 0.5× | 2.0× |
//!
//! Both bounds are rounded down to the nearest 100. The band does not
//! necessarily contain the follower count it was derived from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

const BOUND_STEP: u64 = 100;

/// Band multipliers in tenths, as `(low, high)`.
fn multipliers_in_tenths(followers: u64) -> (u64, u64) {
    match followers {
        0..=999 => (3, 50),
        1_000..=4_999 => (4, 30),
        5_000..=9_999 => (5, 25),
        _ => (5, 20),
    }
}

fn floor_to_step(value: u64) -> u64 {
    value / BOUND_STEP * BOUND_STEP
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowerBand {
    pub low: u64,
    pub high: u64,
}

impl FollowerBand {
    #[must_use]
    pub fn for_followers(followers: u64) -> Self {
        let (low_tenths, high_tenths) = multipliers_in_tenths(followers);
        Self {
            low: floor_to_step(followers.saturating_mul(low_tenths) / 10),
            high: floor_to_step(followers.saturating_mul(high_tenths) / 10),
        }
    }

    /// `high / low`, or `None` when the low bound is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn width_ratio(&self) -> Option<f64> {
        (self.low > 0).then(|| self.high as f64 / self.low as f64)
    }
}

impl fmt::Display for FollowerBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Composite key `niche_low-high` identifying one shared peer group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    niche: String,
    band: FollowerBand,
}

impl PoolKey {
    #[must_use]
    pub fn new(niche: &str, followers: u64) -> Self {
        Self::from_band(niche, FollowerBand::for_followers(followers))
    }

    #[must_use]
    pub fn from_band(niche: &str, band: FollowerBand) -> Self {
        Self {
            niche: niche.to_string(),
            band,
        }
    }

    #[must_use]
    pub fn niche(&self) -> &str {
        &self.niche
    }

    #[must_use]
    pub fn band(&self) -> FollowerBand {
        self.band
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.niche, self.band)
    }
}

impl FromStr for PoolKey {
    type Err = CoreError;

    /// Parses `niche_low-high`. The niche may itself contain underscores; the
    /// band is always the segment after the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPoolKey(s.to_string());
        let (niche, band) = s.rsplit_once('_').ok_or_else(invalid)?;
        let (low, high) = band.split_once('-').ok_or_else(invalid)?;
        if niche.is_empty() {
            return Err(invalid());
        }
        let low = low.parse::<u64>().map_err(|_| invalid())?;
        let high = high.parse::<u64>().map_err(|_| invalid())?;
        Ok(Self::from_band(niche, FollowerBand { low, high }))
    }
}

impl Serialize for PoolKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PoolKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
