//! Per-miner fingerprint history and temporal consistency.
//!
//! Real oscillators, caches and thermal envelopes wobble from one attestation
//! to the next. A profile that never moves is a captured fingerprint being
//! replayed; one that swings wildly is synthesized noise.
//!
//! ```text
//! history (≤ HISTORY_LIMIT, oldest first) + current snapshot
//!     ─→ frozen? noisy? drift out of band? SIMD identity unstable?
//!     ─→ TemporalVerdict { status, consistency_score, reasons }
//! ```

use serde::{Deserialize, Serialize};

use crate::fingerprint::simd::VectorCapabilities;
use crate::fingerprint::{CheckName, FingerprintReport, stats};

/// Snapshots kept per miner.
pub const HISTORY_LIMIT: usize = 10;
/// Snapshots needed before any verdict is drawn.
pub const MIN_SERIES: usize = 3;

pub const CLOCK_DRIFT_BAND: f64 = 0.03;
pub const ENTROPY_DRIFT_BAND: f64 = 0.25;
pub const THERMAL_DRIFT_BAND: f64 = 0.35;

const FROZEN_CLOCK_VARIANCE: f64 = 1e-10;
const FROZEN_VARIANCE: f64 = 1e-8;

const NOISY_CLOCK_CV: f64 = 0.8;
const NOISY_ENTROPY_CV: f64 = 0.6;
const NOISY_THERMAL_CV: f64 = 1.0;

/// More distinct SIMD identities than this across the history is unstable.
const MAX_SIMD_IDENTITIES: usize = 2;

const FROZEN_PENALTY: f64 = 0.55;
const NOISY_PENALTY: f64 = 0.45;
const DRIFT_PENALTY: f64 = 0.2;
const SIMD_PENALTY: f64 = 0.25;

pub const FROZEN_PROFILE: &str = "frozen_profile";
pub const NOISY_PROFILE: &str = "noisy_profile";
pub const SIMD_IDENTITY_INSTABILITY: &str = "simd_identity_instability";

/// Comparable metrics from one attestation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalSnapshot {
    /// Oscillator coefficient of variation
    pub clock_cv: f64,
    /// Integer-op timing spread relative to its mean
    pub entropy_score: f64,
    /// Hot/cold timing ratio
    pub thermal_score: f64,
    /// Detected vector units, `+`-joined
    pub simd_identity: String,
}

impl TemporalSnapshot {
    /// Build from a report. `None` when the clock, thermal or jitter metrics
    /// are missing: sparse snapshots would read as a frozen profile.
    pub fn from_report(report: &FingerprintReport) -> Option<Self> {
        let clock_cv = report.get(CheckName::ClockDrift)?.metric("cv")?;
        let thermal_score = report.get(CheckName::ThermalDrift)?.metric("drift_ratio")?;

        let jitter = report.get(CheckName::InstructionJitter)?;
        let int_mean = jitter.metric("int_mean_ns")?;
        let int_stdev = jitter.metric("int_stdev")?;
        let entropy_score = if int_mean > 0.0 { int_stdev / int_mean } else { 0.0 };

        let simd_identity = report
            .get(CheckName::SimdIdentity)
            .and_then(|check| VectorCapabilities::from_metrics(&check.metrics))
            .map(|caps| {
                caps.to_metrics()
                    .into_iter()
                    .filter(|(_, v)| *v > 0.5)
                    .map(|(k, _)| k)
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .unwrap_or_default();

        Some(Self {
            clock_cv,
            entropy_score,
            thermal_score,
            simd_identity,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemporalStatus {
    /// Fewer than `MIN_SERIES` snapshots
    #[default]
    InsufficientData,
    Ok,
    /// Drift out of band only; recorded, not penalized
    DriftWarning,
    /// Frozen, noisy or unstable profile; scored as spoofing
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalVerdict {
    pub status: TemporalStatus,
    pub consistency_score: f64,
    pub reasons: Vec<String>,
}

impl TemporalVerdict {
    pub fn insufficient_data() -> Self {
        Self {
            status: TemporalStatus::InsufficientData,
            consistency_score: 1.0,
            reasons: Vec::new(),
        }
    }

    pub fn review_required(&self) -> bool {
        self.status == TemporalStatus::Review
    }
}

fn variance(values: &[f64]) -> f64 {
    let sd = stats::stdev(values);
    sd * sd
}

/// Relative spread; falls back to the plain stdev around a zero mean.
fn spread(values: &[f64]) -> f64 {
    let sd = stats::stdev(values);
    let mean = stats::mean(values).abs();
    if mean < 1e-9 { sd } else { sd / mean }
}

/// Judge `rows` (oldest first, the current snapshot last).
pub fn validate_temporal_consistency(rows: &[TemporalSnapshot]) -> TemporalVerdict {
    if rows.len() < MIN_SERIES {
        return TemporalVerdict::insufficient_data();
    }

    let clock: Vec<f64> = rows.iter().map(|r| r.clock_cv).collect();
    let entropy: Vec<f64> = rows.iter().map(|r| r.entropy_score).collect();
    let thermal: Vec<f64> = rows.iter().map(|r| r.thermal_score).collect();

    let mut reasons = Vec::new();
    let mut score = 1.0;
    let mut review = false;

    if variance(&clock) <= FROZEN_CLOCK_VARIANCE
        && variance(&entropy) <= FROZEN_VARIANCE
        && variance(&thermal) <= FROZEN_VARIANCE
    {
        reasons.push(FROZEN_PROFILE.to_string());
        score -= FROZEN_PENALTY;
        review = true;
    }

    if spread(&clock) > NOISY_CLOCK_CV
        || spread(&entropy) > NOISY_ENTROPY_CV
        || spread(&thermal) > NOISY_THERMAL_CV
    {
        reasons.push(NOISY_PROFILE.to_string());
        score -= NOISY_PENALTY;
        review = true;
    }

    let (previous, current) = rows.split_at(rows.len() - 1);
    let current = &current[0];
    for (name, series, value, band) in [
        ("clock", &clock, current.clock_cv, CLOCK_DRIFT_BAND),
        ("entropy", &entropy, current.entropy_score, ENTROPY_DRIFT_BAND),
        ("thermal", &thermal, current.thermal_score, THERMAL_DRIFT_BAND),
    ] {
        let baseline = stats::mean(&series[..previous.len()]);
        if (value - baseline).abs() > band {
            reasons.push(format!("{}_drift_out_of_band", name));
            score -= DRIFT_PENALTY;
        }
    }

    let mut identities: Vec<&str> = rows
        .iter()
        .map(|r| r.simd_identity.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    identities.sort_unstable();
    identities.dedup();
    if identities.len() > MAX_SIMD_IDENTITIES {
        reasons.push(SIMD_IDENTITY_INSTABILITY.to_string());
        score -= SIMD_PENALTY;
        review = true;
    }

    let status = if review {
        TemporalStatus::Review
    } else if reasons.is_empty() {
        TemporalStatus::Ok
    } else {
        TemporalStatus::DriftWarning
    };

    TemporalVerdict {
        status,
        consistency_score: f64::max(score, 0.0),
        reasons,
    }
}

/// Append `current` to `history`, keeping the newest `HISTORY_LIMIT`.
pub fn push_snapshot(history: &[TemporalSnapshot], current: TemporalSnapshot) -> Vec<TemporalSnapshot> {
    let skip = (history.len() + 1).saturating_sub(HISTORY_LIMIT);
    history
        .iter()
        .skip(skip)
        .cloned()
        .chain(std::iter::once(current))
        .collect()
}
