//! Antiquity Oracle
//!
//! Hardware attestation and antiquity reward weighting. Miners prove they run
//! on a real physical CPU of a claimed vintage; the oracle turns that proof
//! into a per-miner reward multiplier for epoch settlement.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs          - Crate root with re-exports
//! ├── main.rs         - Verifier server entrypoint
//! ├── bin/
//! │   └── fingerprint.rs - Miner-side collector
//! ├── config.rs       - Environment configuration
//! ├── fingerprint/    - Signal collector (six hardware checks)
//! │   ├── clock.rs      - Oscillator drift
//! │   ├── cache.rs      - Cache hierarchy latency
//! │   ├── simd.rs       - Vector unit identity
//! │   ├── thermal.rs    - Cold/hot drift
//! │   ├── jitter.rs     - Instruction timing spread
//! │   └── emulation.rs  - Hypervisor / container indicators
//! ├── classifier/     - Brand string → CPU identity
//! │   └── rules.rs      - Ordered architecture rule table
//! ├── multiplier/     - Antiquity multiplier engine
//! ├── attestation/    - Challenge, submission, verification
//! │   ├── challenge.rs  - Nonces and the nonce store
//! │   ├── submission.rs - Wire format, commitment, signature
//! │   ├── verifier.rs   - Verification pipeline
//! │   ├── temporal.rs   - Fingerprint history consistency
//! │   └── records.rs    - Miner weight records and store
//! └── api/            - HTTP API endpoints
//!     ├── attestation.rs - Attestation & weight endpoints
//!     └── middleware.rs  - Rate limiting, body limits, headers
//! ```

pub mod api;
pub mod attestation;
pub mod classifier;
pub mod config;
pub mod fingerprint;
pub mod multiplier;

// Re-export main types for convenience
pub use config::OracleConfig;

pub use attestation::{
    AttestationChallenge, AttestationError, AttestationSubmission, DeviceInfo, EpochSchedule,
    InMemoryNonceStore, InMemoryWeightStore, MinerWeightRecord, NonceStore, TemporalStatus,
    TemporalVerdict, VerificationOutcome, Verifier, VerifierConfig, WeightStore, compute_commitment,
    reward_shares,
};

pub use classifier::{ArchitectureClassifier, CpuIdentity, Isa, VectorFamily, Vendor, classify};

pub use fingerprint::{
    CheckName, CheckResult, FingerprintCollector, FingerprintConfig, FingerprintReport,
    HardwareCheck,
};

pub use multiplier::{MultiplierBreakdown, MultiplierConfig, MultiplierInputs};

pub use api::{AttestationApiState, OracleVerifier, SecurityState, build_app};
