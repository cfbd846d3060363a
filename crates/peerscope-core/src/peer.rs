//! Peer accounts: discovery results and shared pool entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handle::Handle;
use crate::profile::DerivedProfile;
use crate::CoreError;

/// A comparable account that is growing faster than the analyzed user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub handle: Handle,
    pub followers: u64,
    pub match_score: f64,
    pub match_reason: String,
    pub growth_edge: String,
    pub profile: DerivedProfile,
}

impl PeerRecord {
    /// Builds a peer from one element of the model's `peers` array.
    ///
    /// The element is a flat object: profile fields plus `match_score`,
    /// `match_reason` and `growth_edge`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Shape`] if a known field has the wrong type.
    /// - [`CoreError::InvalidPeer`] if the handle is missing or empty.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let mut profile: DerivedProfile = serde_json::from_value(value)?;
        let handle = Handle::parse(&profile.handle)
            .map_err(|_| CoreError::InvalidPeer("missing handle".to_string()))?;
        profile.handle = handle.to_string();

        let match_score = profile
            .extensions
            .remove("match_score")
            .as_ref()
            .and_then(number_from)
            .unwrap_or(0.0);
        let match_reason = take_string(&mut profile, "match_reason");
        let growth_edge = take_string(&mut profile, "growth_edge");

        Ok(Self {
            handle,
            followers: profile.followers.unwrap_or(0),
            match_score,
            match_reason,
            growth_edge,
            profile,
        })
    }

    /// Monthly follower growth estimate, used as the pool's growth signal.
    #[must_use]
    pub fn growth_rate(&self) -> f64 {
        self.profile
            .estimated_monthly_follower_growth_percent
            .unwrap_or(0.0)
    }
}

fn take_string(profile: &mut DerivedProfile, key: &str) -> String {
    match profile.extensions.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One account in the shared cross-user pool, unique per `(pool_key, handle)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPoolEntry {
    pub id: i64,
    pub handle: Handle,
    pub pool_key: String,
    pub niche: String,
    pub follower_count: u64,
    pub growth_rate: f64,
    pub is_valid: bool,
    pub last_validated: DateTime<Utc>,
    pub times_used: u64,
    pub created_at: DateTime<Utc>,
    /// Last known [`PeerRecord`] for this account, as JSON.
    pub snapshot: Option<Value>,
}

impl PeerPoolEntry {
    /// Decodes the stored snapshot. `None` when absent or no longer decodable.
    #[must_use]
    pub fn peer_record(&self) -> Option<PeerRecord> {
        let snapshot = self.snapshot.clone()?;
        serde_json::from_value(snapshot).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUsageLeader {
    pub handle: Handle,
    pub pool_key: String,
    pub times_used: u64,
}

/// Aggregate health of the pool, optionally scoped to one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: u64,
    pub valid: u64,
    /// Entries whose last validation is outside the validation window.
    pub stale: u64,
    pub invalid: u64,
    pub most_used: Vec<PoolUsageLeader>,
    pub by_niche: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn peer_from_flat_object() {
        let peer = PeerRecord::from_value(json!({
            "handle": "@GrowthGal",
            "followers": 8200,
            "primary_niche": "Personal finance",
            "estimated_monthly_growth_percent": 12.5,
            "match_score": 91,
            "match_reason": "same audience",
            "growth_edge": "daily threads",
            "strengths": ["threads"]
        }))
        .unwrap();

        assert_eq!(peer.handle.as_str(), "growthgal");
        assert_eq!(peer.profile.handle, "growthgal");
        assert_eq!(peer.followers, 8_200);
        assert!((peer.match_score - 91.0).abs() < f64::EPSILON);
        assert_eq!(peer.match_reason, "same audience");
        assert_eq!(peer.growth_edge, "daily threads");
        assert!((peer.growth_rate() - 12.5).abs() < f64::EPSILON);
        assert!(!peer.profile.extensions.contains_key("match_score"));
    }

    #[test]
    fn peer_without_handle_is_invalid() {
        let result = PeerRecord::from_value(json!({"followers": 10, "match_score": 3}));
        assert!(matches!(result, Err(CoreError::InvalidPeer(_))));
    }

    #[test]
    fn missing_match_fields_default() {
        let peer = PeerRecord::from_value(json!({"handle": "x"})).unwrap();
        assert_eq!(peer.followers, 0);
        assert!(peer.match_score.abs() < f64::EPSILON);
        assert!(peer.match_reason.is_empty());
    }

    #[test]
    fn pool_entry_snapshot_round_trips_to_peer() {
        let peer = PeerRecord::from_value(json!({"handle": "y", "followers": 900})).unwrap();
        let entry = PeerPoolEntry {
            id: 1,
            handle: peer.handle.clone(),
            pool_key: "tech_200-4500".to_string(),
            niche: "tech".to_string(),
            follower_count: 900,
            growth_rate: 0.0,
            is_valid: true,
            last_validated: Utc::now(),
            times_used: 0,
            created_at: Utc::now(),
            snapshot: Some(serde_json::to_value(&peer).unwrap()),
        };
        assert_eq!(entry.peer_record(), Some(peer));
    }

    #[test]
    fn undecodable_snapshot_yields_none() {
        let entry = PeerPoolEntry {
            id: 1,
            handle: Handle::parse("z").unwrap(),
            pool_key: "tech_0-0".to_string(),
            niche: "tech".to_string(),
            follower_count: 0,
            growth_rate: 0.0,
            is_valid: true,
            last_validated: Utc::now(),
            times_used: 0,
            created_at: Utc::now(),
            snapshot: Some(json!({"unexpected": true})),
        };
        assert!(entry.peer_record().is_none());
    }
}
