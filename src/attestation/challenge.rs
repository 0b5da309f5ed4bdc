//! Attestation challenges and the single-use nonce store.
//!
//! ```text
//! issue()  ──→ CHALLENGE_ISSUED ──consume()──→ removed (exactly once)
//!                    │
//!                    └── past ttl: consume() rejects; evict_expired() drops it
//! ```
//!
//! TTL is enforced by wall-clock comparison on consume. Eviction and the
//! outstanding-challenge cap bound memory.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::error::AttestationError;

pub const NONCE_BYTES: usize = 32;

/// Default cap on challenges held at once.
pub const DEFAULT_MAX_OUTSTANDING: usize = 10_000;

/// A nonce a miner must bind into its next submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttestationChallenge {
    /// 32 random bytes, hex encoded
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl AttestationChallenge {
    pub fn new(issued_at: DateTime<Utc>, ttl_seconds: u64) -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            nonce: hex::encode(bytes),
            issued_at,
            ttl_seconds,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}

/// Keyed store with atomic check-and-consume.
pub trait NonceStore: Send + Sync {
    /// Issue and remember a fresh challenge. Fails with `ChallengeCapacity`
    /// when the store is full of unexpired challenges.
    fn issue(&self, now: DateTime<Utc>) -> Result<AttestationChallenge, AttestationError>;

    /// Remove `nonce` and return its challenge. Fails if it was never issued,
    /// was already consumed, or has expired. At most one caller can ever
    /// succeed for a given nonce.
    fn consume(&self, nonce: &str, now: DateTime<Utc>) -> Result<AttestationChallenge, AttestationError>;

    /// Drop expired challenges, returning how many were removed.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;

    fn outstanding(&self) -> usize;
}

/// `DashMap`-backed store; `remove` is the atomic consume.
pub struct InMemoryNonceStore {
    challenges: DashMap<String, AttestationChallenge>,
    ttl_seconds: u64,
    max_outstanding: usize,
}

impl InMemoryNonceStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_capacity(ttl_seconds, DEFAULT_MAX_OUTSTANDING)
    }

    pub fn with_capacity(ttl_seconds: u64, max_outstanding: usize) -> Self {
        Self {
            challenges: DashMap::new(),
            ttl_seconds,
            max_outstanding,
        }
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Track an externally built challenge.
    pub fn insert(&self, challenge: AttestationChallenge) {
        self.challenges.insert(challenge.nonce.clone(), challenge);
    }
}

impl NonceStore for InMemoryNonceStore {
    fn issue(&self, now: DateTime<Utc>) -> Result<AttestationChallenge, AttestationError> {
        if self.challenges.len() >= self.max_outstanding {
            self.evict_expired(now);
            if self.challenges.len() >= self.max_outstanding {
                return Err(AttestationError::ChallengeCapacity);
            }
        }
        let challenge = AttestationChallenge::new(now, self.ttl_seconds);
        self.insert(challenge.clone());
        Ok(challenge)
    }

    fn consume(&self, nonce: &str, now: DateTime<Utc>) -> Result<AttestationChallenge, AttestationError> {
        let (_, challenge) = self
            .challenges
            .remove(nonce)
            .ok_or(AttestationError::StaleOrReplayedNonce)?;
        if challenge.is_expired(now) {
            return Err(AttestationError::StaleOrReplayedNonce);
        }
        Ok(challenge)
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.challenges.len();
        self.challenges.retain(|_, c| !c.is_expired(now));
        before.saturating_sub(self.challenges.len())
    }

    fn outstanding(&self) -> usize {
        self.challenges.len()
    }
}
