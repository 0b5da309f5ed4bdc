//! Submission verification.
//!
//! ```text
//! structure ─→ commitment ─→ signature + pinned key ─→ consume nonce
//!     ─→ classify brand ─→ consistency cross-check
//!     ─→ temporal history check ─→ score ─→ persist
//! ```
//!
//! The nonce is consumed only after the cryptographic checks pass, so a forged
//! body cannot burn a miner's challenge. Everything after the consume is
//! scoring: it can lower the weight but never rejects.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::challenge::{AttestationChallenge, NonceStore};
use super::error::AttestationError;
use super::records::{EpochSchedule, MinerWeightRecord, WeightStore};
use super::submission::AttestationSubmission;
use super::temporal::{self, TemporalSnapshot, TemporalVerdict};
use crate::classifier::{ArchitectureClassifier, CpuIdentity, Isa};
use crate::config::sanitize_for_logging;
use crate::fingerprint::emulation::find_vm_signature;
use crate::fingerprint::simd::{VectorCapabilities, vector_matches_claim};
use crate::fingerprint::CheckName;
use crate::multiplier::{self, MultiplierBreakdown, MultiplierConfig, MultiplierInputs};

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub multiplier: MultiplierConfig,
    /// Pin the scoring year instead of taking it from the clock.
    pub current_year_override: Option<i32>,
    /// Largest gap between attestations that keeps a loyalty streak alive.
    pub max_attestation_gap: Duration,
    pub epochs: EpochSchedule,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            multiplier: MultiplierConfig::default(),
            current_year_override: None,
            max_attestation_gap: Duration::hours(48),
            epochs: EpochSchedule::default(),
        }
    }
}

/// Result of the claim-vs-hardware cross-check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsistencyReport {
    pub reasons: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Everything produced by a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub record: MinerWeightRecord,
    pub identity: CpuIdentity,
    pub breakdown: MultiplierBreakdown,
    pub consistency: ConsistencyReport,
    pub temporal: TemporalVerdict,
}

/// Cross-check the claimed CPU against what the fingerprint and device fields
/// reveal.
pub fn check_consistency(identity: &CpuIdentity, submission: &AttestationSubmission) -> ConsistencyReport {
    let mut reasons = Vec::new();

    match submission
        .fingerprint
        .get(CheckName::SimdIdentity)
        .and_then(|check| VectorCapabilities::from_metrics(&check.metrics))
    {
        Some(caps) => {
            let detected = caps.family();
            if !vector_matches_claim(identity.expected_vector, identity.isa, detected) {
                reasons.push(format!(
                    "claimed {} but detected vector family {}",
                    identity.architecture,
                    detected.as_str()
                ));
            }
        }
        None => reasons.push("simd_identity metrics missing".to_string()),
    }

    if identity.isa != Isa::Unknown {
        for (field, value) in [
            ("family", &submission.device.family),
            ("arch", &submission.device.arch),
        ] {
            if let Some(claimed) = Isa::from_claim(value) {
                if claimed != identity.isa {
                    reasons.push(format!(
                        "device.{} {:?} contradicts brand {:?}",
                        field, value, submission.device.model
                    ));
                }
            }
        }
    }

    let mut scanned: Vec<(&str, &str)> = vec![
        ("hostname", submission.device.hostname.as_str()),
        ("model", submission.device.model.as_str()),
    ];
    for (key, value) in &submission.signals {
        if let Some(text) = value.as_str() {
            scanned.push((key.as_str(), text));
        }
    }
    for (field, text) in scanned {
        if let Some(signature) = find_vm_signature(text) {
            reasons.push(format!("{} matches VM signature {}", field, signature));
        }
    }

    ConsistencyReport { reasons }
}

/// Stateless verifier over a nonce store and a weight store.
pub struct Verifier<N, W> {
    nonces: N,
    weights: W,
    classifier: &'static ArchitectureClassifier,
    config: VerifierConfig,
}

impl<N: NonceStore, W: WeightStore> Verifier<N, W> {
    pub fn new(nonces: N, weights: W, config: VerifierConfig) -> Self {
        Self {
            nonces,
            weights,
            classifier: ArchitectureClassifier::builtin(),
            config,
        }
    }

    pub fn nonces(&self) -> &N {
        &self.nonces
    }

    pub fn weights(&self) -> &W {
        &self.weights
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ArchitectureClassifier {
        self.classifier
    }

    pub fn issue_challenge(&self, now: DateTime<Utc>) -> Result<AttestationChallenge, AttestationError> {
        let challenge = self.nonces.issue(now).inspect_err(|_| {
            warn!(
                outstanding = self.nonces.outstanding(),
                "Challenge store full, refusing new challenge"
            )
        })?;
        debug!(expires_at = %challenge.expires_at(), "Issued attestation challenge");
        Ok(challenge)
    }

    fn current_year(&self, now: DateTime<Utc>) -> i32 {
        self.config.current_year_override.unwrap_or_else(|| now.year())
    }

    pub async fn verify(
        &self,
        submission: &AttestationSubmission,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, AttestationError> {
        let miner = sanitize_for_logging(&submission.miner_id);
        let result = self.verify_inner(submission, now).await;
        match &result {
            Ok(outcome) => info!(
                miner_id = %miner,
                architecture = %outcome.identity.architecture,
                pass_count = outcome.record.pass_count,
                suspected_spoofing = outcome.record.suspected_spoofing,
                final_multiplier = outcome.record.final_multiplier,
                "Attestation verified"
            ),
            Err(e) => warn!(miner_id = %miner, code = e.code(), error = %e, "Attestation rejected"),
        }
        result
    }

    async fn verify_inner(
        &self,
        submission: &AttestationSubmission,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, AttestationError> {
        submission.validate_structure()?;

        if !submission.commitment_matches() {
            return Err(AttestationError::CommitmentMismatch);
        }

        submission.verify_signature()?;
        let public_key = submission.public_key_hex();
        if let Some(existing) = self.weights.get(&submission.miner_id).await? {
            if existing.public_key != public_key {
                return Err(AttestationError::SignatureMismatch(
                    "public key differs from the key pinned for this miner".to_string(),
                ));
            }
        }

        self.nonces.consume(&submission.nonce, now)?;

        let identity = self.classifier.classify(&submission.device.model);
        let consistency = check_consistency(&identity, submission);
        if !consistency.is_consistent() {
            warn!(
                miner_id = %sanitize_for_logging(&submission.miner_id),
                reasons = ?consistency.reasons,
                "Inconsistent hardware signals, applying maximal penalty"
            );
        }

        let pass_count = submission.fingerprint.pass_count();
        let current_year = self.current_year(now);
        let epoch = self.config.epochs.epoch_at(now);
        let max_gap = self.config.max_attestation_gap;
        let multiplier_config = &self.config.multiplier;
        let inconsistent_signals = !consistency.is_consistent();
        let snapshot = TemporalSnapshot::from_report(&submission.fingerprint);

        let mut breakdown = None;
        let mut temporal_verdict = None;
        let record = self
            .weights
            .apply(&submission.miner_id, |existing| {
                if let Some(existing) = existing {
                    if existing.public_key != public_key {
                        return Err(AttestationError::SignatureMismatch(
                            "public key differs from the key pinned for this miner".to_string(),
                        ));
                    }
                }

                let attesting_since = match existing {
                    Some(r) if now - r.last_attested_at <= max_gap => r.attesting_since,
                    _ => now,
                };
                let uptime_years = (now - attesting_since).num_seconds().max(0) as f64 / SECONDS_PER_YEAR;

                let history = existing.map_or(&[][..], |r| r.fingerprint_history.as_slice());
                let (fingerprint_history, verdict) = match snapshot {
                    Some(current) => {
                        let rows = temporal::push_snapshot(history, current);
                        let verdict = temporal::validate_temporal_consistency(&rows);
                        (rows, verdict)
                    }
                    None => (history.to_vec(), TemporalVerdict::insufficient_data()),
                };
                let suspected_spoofing = inconsistent_signals || verdict.review_required();

                let scored = multiplier::compute(
                    &MultiplierInputs {
                        identity: &identity,
                        current_year,
                        uptime_years,
                        pass_count,
                        inconsistent_signals: suspected_spoofing,
                    },
                    multiplier_config,
                );

                let record = MinerWeightRecord {
                    miner_id: submission.miner_id.clone(),
                    architecture: identity.architecture.clone(),
                    base_multiplier: scored.base_multiplier,
                    decayed_bonus: scored.decayed_bonus,
                    loyalty_bonus: scored.loyalty_bonus,
                    server_bonus: scored.server_bonus(),
                    final_multiplier: scored.final_multiplier,
                    pass_count,
                    suspected_spoofing,
                    last_updated: epoch,
                    attesting_since,
                    last_attested_at: now,
                    public_key: public_key.clone(),
                    attestation_count: existing.map_or(0, |r| r.attestation_count) + 1,
                    temporal_status: verdict.status,
                    fingerprint_history,
                };
                breakdown = Some(scored);
                temporal_verdict = Some(verdict);
                Ok(record)
            })
            .await?;

        let (breakdown, temporal) = breakdown
            .zip(temporal_verdict)
            .ok_or_else(|| AttestationError::Storage("weight store skipped the update".to_string()))?;

        if !temporal.reasons.is_empty() {
            warn!(
                miner_id = %sanitize_for_logging(&submission.miner_id),
                status = ?temporal.status,
                consistency_score = temporal.consistency_score,
                reasons = ?temporal.reasons,
                "Fingerprint history anomaly"
            );
        }

        Ok(VerificationOutcome {
            record,
            identity,
            breakdown,
            consistency,
            temporal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::challenge::InMemoryNonceStore;
    use crate::attestation::records::InMemoryWeightStore;
    use crate::attestation::submission::DeviceInfo;
    use crate::attestation::temporal::TemporalStatus;
    use crate::classifier::classify;
    use crate::fingerprint::test_support::report_with_passes;
    use crate::fingerprint::{CheckResult, FingerprintReport};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::collections::BTreeMap;

    type TestVerifier = Verifier<InMemoryNonceStore, InMemoryWeightStore>;

    fn verifier() -> TestVerifier {
        Verifier::new(
            InMemoryNonceStore::new(300),
            InMemoryWeightStore::new(),
            VerifierConfig {
                current_year_override: Some(2025),
                ..Default::default()
            },
        )
    }

    fn fingerprint(pass_count: usize, caps: VectorCapabilities) -> FingerprintReport {
        let mut report = report_with_passes(pass_count);
        let simd = report.checks.get_mut(&CheckName::SimdIdentity).unwrap();
        simd.metrics = caps.to_metrics();
        report
    }

    fn altivec() -> VectorCapabilities {
        VectorCapabilities {
            has_altivec: true,
            ..Default::default()
        }
    }

    fn submission(
        nonce: &str,
        key: &SigningKey,
        family: &str,
        model: &str,
        report: FingerprintReport,
        now: DateTime<Utc>,
    ) -> AttestationSubmission {
        let mut s = AttestationSubmission {
            miner_id: "miner-1".to_string(),
            device: DeviceInfo {
                family: family.to_string(),
                arch: String::new(),
                model: model.to_string(),
                hostname: "workbench".to_string(),
            },
            signals: BTreeMap::new(),
            fingerprint: report,
            nonce: nonce.to_string(),
            timestamp: 0,
            commitment: String::new(),
            public_key: String::new(),
            signature: String::new(),
        };
        s.sign(key, now.timestamp());
        s
    }

    #[tokio::test]
    async fn test_g4_verifies_and_persists() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;

        let s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        let outcome = v.verify(&s, now).await.unwrap();

        assert_eq!(outcome.identity.architecture, "g4");
        assert!(!outcome.record.suspected_spoofing);
        assert!((outcome.record.final_multiplier - 1.645).abs() < 1e-9);
        assert_eq!(outcome.record.attestation_count, 1);

        let stored = v.weights().get("miner-1").await.unwrap().unwrap();
        assert_eq!(stored, outcome.record);
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);

        assert!(v.verify(&s, now).await.is_ok());
        assert_eq!(
            v.verify(&s, now).await.unwrap_err(),
            AttestationError::StaleOrReplayedNonce
        );
    }

    #[tokio::test]
    async fn test_forged_body_does_not_burn_nonce() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;

        let mut forged = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        forged.signature = "00".repeat(64);
        assert!(matches!(
            v.verify(&forged, now).await,
            Err(AttestationError::SignatureMismatch(_))
        ));

        let genuine = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        assert!(v.verify(&genuine, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_commitment_mismatch() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let mut s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        s.timestamp += 1;
        assert_eq!(v.verify(&s, now).await.unwrap_err(), AttestationError::CommitmentMismatch);
    }

    #[tokio::test]
    async fn test_pinned_key_enforced() {
        let v = verifier();
        let now = Utc::now();
        let first_key = SigningKey::generate(&mut OsRng);
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let s = submission(&nonce, &first_key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        v.verify(&s, now).await.unwrap();

        let other_key = SigningKey::generate(&mut OsRng);
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let s = submission(&nonce, &other_key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        assert!(matches!(
            v.verify(&s, now).await,
            Err(AttestationError::SignatureMismatch(_))
        ));
        // rejected before consume: the nonce is still usable
        assert_eq!(v.nonces().outstanding(), 1);
    }

    #[tokio::test]
    async fn test_vector_mismatch_is_penalized_not_rejected() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let sse = VectorCapabilities {
            has_sse: true,
            has_avx: true,
            ..Default::default()
        };
        let s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, sse), now);

        let outcome = v.verify(&s, now).await.unwrap();
        assert!(outcome.record.suspected_spoofing);
        assert_eq!(outcome.breakdown.effective_pass_count, 0);
        assert!(outcome.record.final_multiplier < 1e-8);
    }

    #[tokio::test]
    async fn test_vm_hostname_is_penalized() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let mut s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        s.device.hostname = "qemu-ppc-guest".to_string();
        s.sign(&key, now.timestamp());

        let outcome = v.verify(&s, now).await.unwrap();
        assert!(outcome.record.suspected_spoofing);
        assert!(outcome.consistency.reasons.iter().any(|r| r.contains("qemu")));
    }

    #[test]
    fn test_family_claim_contradiction() {
        let identity = classify("PowerPC G4 (7450)");
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let s = submission(&"ab".repeat(32), &key, "x86_64", "PowerPC G4 (7450)", fingerprint(6, altivec()), now);
        let report = check_consistency(&identity, &s);
        assert!(!report.is_consistent());
        assert!(report.reasons[0].contains("device.family"));
    }

    #[test]
    fn test_missing_simd_metrics_inconsistent() {
        let identity = classify("PowerPC G4 (7450)");
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let mut report = report_with_passes(6);
        report
            .checks
            .insert(CheckName::SimdIdentity, CheckResult::pass(Default::default()));
        let s = submission(&"ab".repeat(32), &key, "PowerPC", "PowerPC G4 (7450)", report, now);
        assert!(!check_consistency(&identity, &s).is_consistent());
    }

    fn set(report: &mut FingerprintReport, name: CheckName, pairs: &[(&str, f64)]) {
        let check = report.checks.get_mut(&name).unwrap();
        for (key, value) in pairs {
            check.metrics.insert(key.to_string(), *value);
        }
    }

    fn with_timing(mut report: FingerprintReport, clock_cv: f64, drift_ratio: f64) -> FingerprintReport {
        set(&mut report, CheckName::ClockDrift, &[("cv", clock_cv)]);
        set(&mut report, CheckName::ThermalDrift, &[("drift_ratio", drift_ratio)]);
        set(
            &mut report,
            CheckName::InstructionJitter,
            &[("int_mean_ns", 100.0), ("int_stdev", 20.0)],
        );
        report
    }

    #[tokio::test]
    async fn test_replayed_fingerprint_flagged_on_third_attestation() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let mut now = Utc::now();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let nonce = v.issue_challenge(now).unwrap().nonce;
            let report = with_timing(fingerprint(6, altivec()), 0.0123, 1.08);
            let s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", report, now);
            outcomes.push(v.verify(&s, now).await.unwrap());
            now += Duration::hours(6);
        }

        assert_eq!(outcomes[1].temporal.status, TemporalStatus::InsufficientData);
        assert!(!outcomes[1].record.suspected_spoofing);

        let last = &outcomes[2];
        assert_eq!(last.temporal.status, TemporalStatus::Review);
        assert!(last.temporal.reasons.contains(&temporal::FROZEN_PROFILE.to_string()));
        assert!(last.record.suspected_spoofing);
        assert_eq!(last.breakdown.effective_pass_count, 0);
        assert_eq!(last.record.fingerprint_history.len(), 3);
    }

    #[tokio::test]
    async fn test_live_fingerprint_history_passes() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let mut now = Utc::now();

        let mut last = None;
        for (clock_cv, drift_ratio) in [(0.012, 1.08), (0.014, 1.11), (0.011, 1.05), (0.013, 1.09)] {
            let nonce = v.issue_challenge(now).unwrap().nonce;
            let report = with_timing(fingerprint(6, altivec()), clock_cv, drift_ratio);
            let s = submission(&nonce, &key, "PowerPC", "PowerPC G4 (7450)", report, now);
            last = Some(v.verify(&s, now).await.unwrap());
            now += Duration::hours(6);
        }

        let last = last.unwrap();
        assert_eq!(last.temporal.status, TemporalStatus::Ok);
        assert!(!last.record.suspected_spoofing);
        assert_eq!(last.record.temporal_status, TemporalStatus::Ok);
        assert!((last.record.final_multiplier - 1.645).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_loyalty_streak_and_gap_reset() {
        let v = verifier();
        let key = SigningKey::generate(&mut OsRng);
        let sse = VectorCapabilities {
            has_sse: true,
            has_avx: true,
            ..Default::default()
        };
        let start = Utc::now() - Duration::days(800);

        // daily attestations keep the streak alive
        let mut now = start;
        let mut last = None;
        for _ in 0..3 {
            let nonce = v.issue_challenge(now).unwrap().nonce;
            let s = submission(&nonce, &key, "x86_64", "AMD Ryzen 9 7950X", fingerprint(6, sse), now);
            last = Some(v.verify(&s, now).await.unwrap());
            now += Duration::days(1);
        }
        let last = last.unwrap();
        assert_eq!(last.record.attesting_since, start);
        assert_eq!(last.record.attestation_count, 3);
        assert!(last.record.loyalty_bonus > 0.0);

        // a gap beyond the limit restarts the streak
        now += Duration::days(30);
        let nonce = v.issue_challenge(now).unwrap().nonce;
        let s = submission(&nonce, &key, "x86_64", "AMD Ryzen 9 7950X", fingerprint(6, sse), now);
        let outcome = v.verify(&s, now).await.unwrap();
        assert_eq!(outcome.record.attesting_since, now);
        assert_eq!(outcome.record.loyalty_bonus, 0.0);
        assert_eq!(outcome.record.attestation_count, 4);
    }
}
