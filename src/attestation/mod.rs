//! Attestation Protocol
//!
//! Challenge-response exchange binding fingerprint signals, the claimed CPU
//! and a single-use nonce into one signed submission.
//!
//! ```text
//!  miner                                   oracle
//!    │ ── POST /attest/challenge ───────────→ │ NonceStore::issue
//!    │ ←──────────── {nonce, ttl} ─────────── │
//!    │  collect fingerprint                    │
//!    │  commitment = H(nonce‖id‖ts), sign      │
//!    │ ── POST /attest/submit ──────────────→ │ Verifier::verify
//!    │ ←────── {ok, final_multiplier} ─────── │   └─→ WeightStore (+ history)
//! ```

pub mod challenge;
pub mod error;
pub mod records;
pub mod submission;
pub mod temporal;
pub mod verifier;

pub use challenge::{AttestationChallenge, InMemoryNonceStore, NONCE_BYTES, NonceStore};
pub use error::AttestationError;
pub use records::{EpochSchedule, InMemoryWeightStore, MinerWeightRecord, WeightStore, reward_shares};
pub use submission::{AttestationSubmission, DeviceInfo, compute_commitment};
pub use temporal::{TemporalSnapshot, TemporalStatus, TemporalVerdict, validate_temporal_consistency};
pub use verifier::{ConsistencyReport, VerificationOutcome, Verifier, VerifierConfig, check_consistency};
