//! Per-miner weight records consumed by epoch settlement.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::error::AttestationError;
use super::temporal::{TemporalSnapshot, TemporalStatus};

/// Latest verified weight of one miner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinerWeightRecord {
    pub miner_id: String,
    pub architecture: String,
    pub base_multiplier: f64,
    pub decayed_bonus: f64,
    pub loyalty_bonus: f64,
    pub server_bonus: f64,
    pub final_multiplier: f64,
    pub pass_count: usize,
    pub suspected_spoofing: bool,
    /// Epoch of the last update
    pub last_updated: u64,
    /// Start of the current continuous-attestation streak
    pub attesting_since: DateTime<Utc>,
    pub last_attested_at: DateTime<Utc>,
    /// Key pinned on first successful verification
    pub public_key: String,
    pub attestation_count: u64,
    #[serde(default)]
    pub temporal_status: TemporalStatus,
    /// Recent fingerprint snapshots, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fingerprint_history: Vec<TemporalSnapshot>,
}

/// Fixed-length epochs counted from a genesis timestamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpochSchedule {
    pub genesis_unix: i64,
    pub length_secs: u64,
}

impl Default for EpochSchedule {
    fn default() -> Self {
        Self {
            genesis_unix: 1_764_706_927,
            length_secs: 86_400,
        }
    }
}

impl EpochSchedule {
    /// Epoch containing `now`; zero before genesis.
    pub fn epoch_at(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = now.timestamp().saturating_sub(self.genesis_unix);
        if elapsed <= 0 || self.length_secs == 0 {
            return 0;
        }
        elapsed as u64 / self.length_secs
    }
}

/// Persistence for weight records.
///
/// `apply` runs `update` against the current record under the store's write
/// lock, so a read-modify-write per miner is atomic.
#[async_trait]
pub trait WeightStore: Send + Sync {
    async fn get(&self, miner_id: &str) -> Result<Option<MinerWeightRecord>, AttestationError>;

    async fn apply<F>(&self, miner_id: &str, update: F) -> Result<MinerWeightRecord, AttestationError>
    where
        F: FnOnce(Option<&MinerWeightRecord>) -> Result<MinerWeightRecord, AttestationError> + Send;

    async fn all(&self) -> Result<Vec<MinerWeightRecord>, AttestationError>;

    /// Remove records not attested within `max_age` of `now`.
    async fn evict_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Result<usize, AttestationError>;
}

#[derive(Default)]
pub struct InMemoryWeightStore {
    records: RwLock<HashMap<String, MinerWeightRecord>>,
}

impl InMemoryWeightStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WeightStore for InMemoryWeightStore {
    async fn get(&self, miner_id: &str) -> Result<Option<MinerWeightRecord>, AttestationError> {
        Ok(self.records.read().await.get(miner_id).cloned())
    }

    async fn apply<F>(&self, miner_id: &str, update: F) -> Result<MinerWeightRecord, AttestationError>
    where
        F: FnOnce(Option<&MinerWeightRecord>) -> Result<MinerWeightRecord, AttestationError> + Send,
    {
        let mut records = self.records.write().await;
        let record = update(records.get(miner_id))?;
        if record.miner_id != miner_id {
            return Err(AttestationError::Storage(format!(
                "record for {} written under key {}",
                record.miner_id, miner_id
            )));
        }
        records.insert(miner_id.to_string(), record.clone());
        Ok(record)
    }

    async fn all(&self) -> Result<Vec<MinerWeightRecord>, AttestationError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.miner_id.cmp(&b.miner_id));
        Ok(records)
    }

    async fn evict_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Result<usize, AttestationError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| now - r.last_attested_at <= max_age);
        Ok(before - records.len())
    }
}

/// Each miner's proportional share of `pool`, by `final_multiplier`.
pub fn reward_shares(records: &[MinerWeightRecord], pool: f64) -> Vec<(String, f64)> {
    let total: f64 = records.iter().map(|r| r.final_multiplier).sum();
    if total <= 0.0 || !total.is_finite() {
        return records.iter().map(|r| (r.miner_id.clone(), 0.0)).collect();
    }
    records
        .iter()
        .map(|r| (r.miner_id.clone(), pool * r.final_multiplier / total))
        .collect()
}

#[cfg(test)]
pub(crate) fn sample_record(miner_id: &str, final_multiplier: f64, at: DateTime<Utc>) -> MinerWeightRecord {
    MinerWeightRecord {
        miner_id: miner_id.to_string(),
        architecture: "g4".to_string(),
        base_multiplier: 2.5,
        decayed_bonus: 0.645,
        loyalty_bonus: 0.0,
        server_bonus: 0.0,
        final_multiplier,
        pass_count: 6,
        suspected_spoofing: false,
        last_updated: 0,
        attesting_since: at,
        last_attested_at: at,
        public_key: "00".repeat(32),
        attestation_count: 1,
        temporal_status: TemporalStatus::InsufficientData,
        fingerprint_history: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_schedule() {
        let schedule = EpochSchedule::default();
        let genesis = DateTime::from_timestamp(schedule.genesis_unix, 0).unwrap();
        assert_eq!(schedule.epoch_at(genesis), 0);
        assert_eq!(schedule.epoch_at(genesis + Duration::seconds(86_399)), 0);
        assert_eq!(schedule.epoch_at(genesis + Duration::seconds(86_400)), 1);
        assert_eq!(schedule.epoch_at(genesis + Duration::days(10) + Duration::hours(3)), 10);
        assert_eq!(schedule.epoch_at(genesis - Duration::days(3)), 0);
    }

    #[tokio::test]
    async fn test_apply_inserts_and_updates() {
        let store = InMemoryWeightStore::new();
        let now = Utc::now();

        let first = store
            .apply("m1", |existing| {
                assert!(existing.is_none());
                Ok(sample_record("m1", 1.5, now))
            })
            .await
            .unwrap();
        assert_eq!(first.attestation_count, 1);

        store
            .apply("m1", |existing| {
                let mut record = existing.cloned().unwrap();
                record.attestation_count += 1;
                Ok(record)
            })
            .await
            .unwrap();

        assert_eq!(store.get("m1").await.unwrap().unwrap().attestation_count, 2);
        assert!(store.get("m2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_error_leaves_record_untouched() {
        let store = InMemoryWeightStore::new();
        let now = Utc::now();
        store.apply("m1", |_| Ok(sample_record("m1", 1.5, now))).await.unwrap();

        let result = store
            .apply("m1", |_| Err(AttestationError::SignatureMismatch("pinned".into())))
            .await;
        assert!(result.is_err());
        assert_eq!(store.get("m1").await.unwrap().unwrap().final_multiplier, 1.5);
    }

    #[tokio::test]
    async fn test_evict_stale() {
        let store = InMemoryWeightStore::new();
        let now = Utc::now();
        store
            .apply("old", |_| Ok(sample_record("old", 1.0, now - Duration::days(30))))
            .await
            .unwrap();
        store.apply("new", |_| Ok(sample_record("new", 1.0, now))).await.unwrap();

        assert_eq!(store.evict_stale(now, Duration::days(7)).await.unwrap(), 1);
        let remaining = store.all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].miner_id, "new");
    }

    #[test]
    fn test_reward_shares_proportional() {
        let now = Utc::now();
        let records = vec![
            sample_record("a", 3.0, now),
            sample_record("b", 1.0, now),
        ];
        let shares = reward_shares(&records, 100.0);
        assert_eq!(shares[0], ("a".to_string(), 75.0));
        assert_eq!(shares[1], ("b".to_string(), 25.0));

        assert!(reward_shares(&[], 100.0).is_empty());
    }
}
