//! Hardware Signal Collector
//!
//! Runs on the miner host and produces six independent timing/behavior
//! signals that together distinguish a physical CPU from a VM or emulator.
//!
//! ```text
//! FingerprintCollector
//!   ├── clock_drift         oscillator jitter of a fixed hash workload
//!   ├── cache_timing        L1 < L2 < L3 pointer-chase latency
//!   ├── simd_identity       detected vector unit vs claimed CPU line
//!   ├── thermal_drift       cold vs hot workload duration
//!   ├── instruction_jitter  int / float / branch timing spread
//!   └── anti_emulation      hypervisor and container indicators
//!          ↓
//! FingerprintReport { all_passed, checks }
//! ```
//!
//! Checks run back-to-back on the calling thread with fixed iteration counts.
//! A check that errors or panics is recorded as failed and never aborts the
//! rest of the collection.

pub mod cache;
pub mod clock;
pub mod emulation;
pub mod jitter;
pub mod simd;
pub mod stats;
pub mod thermal;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, warn};

use crate::classifier::CpuIdentity;

pub use cache::CacheTimingCheck;
pub use clock::ClockDriftCheck;
pub use emulation::{AntiEmulationCheck, HostIndicator, HostProbe, SystemHostProbe};
pub use jitter::InstructionJitterCheck;
pub use simd::{NativeVectorProbe, SimdIdentityCheck, VectorCapabilities, VectorProbe};
pub use thermal::ThermalDriftCheck;

pub type Metrics = BTreeMap<String, f64>;

/// Fail reason recorded for a check that errored or panicked.
pub const ERROR_REASON: &str = "error";

// ============================================================================
// Check Interface
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    ClockDrift,
    CacheTiming,
    SimdIdentity,
    ThermalDrift,
    InstructionJitter,
    AntiEmulation,
}

impl CheckName {
    pub const ALL: [CheckName; 6] = [
        CheckName::ClockDrift,
        CheckName::CacheTiming,
        CheckName::SimdIdentity,
        CheckName::ThermalDrift,
        CheckName::InstructionJitter,
        CheckName::AntiEmulation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::ClockDrift => "clock_drift",
            CheckName::CacheTiming => "cache_timing",
            CheckName::SimdIdentity => "simd_identity",
            CheckName::ThermalDrift => "thermal_drift",
            CheckName::InstructionJitter => "instruction_jitter",
            CheckName::AntiEmulation => "anti_emulation",
        }
    }
}

impl std::fmt::Display for CheckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub passed: bool,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

impl CheckResult {
    pub fn pass(metrics: Metrics) -> Self {
        Self {
            passed: true,
            metrics,
            fail_reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            passed: false,
            metrics,
            fail_reason: Some(reason.into()),
        }
    }

    pub fn error() -> Self {
        Self::fail(ERROR_REASON, Metrics::new())
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// One hardware signal. Implementations must be bounded in time.
pub trait HardwareCheck: Send + Sync {
    fn name(&self) -> CheckName;
    fn run(&self) -> Result<CheckResult>;
}

// ============================================================================
// Report
// ============================================================================

/// All six check outcomes, as submitted with an attestation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FingerprintReport {
    pub all_passed: bool,
    pub checks: BTreeMap<CheckName, CheckResult>,
}

impl FingerprintReport {
    pub fn from_checks(checks: BTreeMap<CheckName, CheckResult>) -> Self {
        let all_passed = CheckName::ALL
            .iter()
            .all(|name| checks.get(name).is_some_and(|c| c.passed));
        Self { all_passed, checks }
    }

    /// Number of the six named checks that passed. Missing checks count as
    /// failed.
    pub fn pass_count(&self) -> usize {
        CheckName::ALL
            .iter()
            .filter(|name| self.checks.get(name).is_some_and(|c| c.passed))
            .count()
    }

    pub fn get(&self, name: CheckName) -> Option<&CheckResult> {
        self.checks.get(&name)
    }

    pub fn missing_checks(&self) -> Vec<CheckName> {
        CheckName::ALL
            .iter()
            .copied()
            .filter(|name| !self.checks.contains_key(name))
            .collect()
    }

    /// First structural defect, if any: a missing check, a non-finite metric,
    /// or an `all_passed` flag that disagrees with the individual checks.
    pub fn structural_problem(&self) -> Option<String> {
        let missing = self.missing_checks();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|n| n.as_str()).collect();
            return Some(format!("fingerprint missing checks: {}", names.join(", ")));
        }
        for (name, check) in &self.checks {
            if let Some((key, _)) = check.metrics.iter().find(|(_, v)| !v.is_finite()) {
                return Some(format!("{} metric {} is not finite", name, key));
            }
        }
        let recomputed = self.pass_count() == CheckName::ALL.len();
        if recomputed != self.all_passed {
            return Some(format!(
                "all_passed={} disagrees with checks ({} of 6 passed)",
                self.all_passed,
                self.pass_count()
            ));
        }
        None
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Iteration counts and thresholds of the six checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub clock_samples: usize,
    pub clock_workload_iterations: usize,
    pub clock_noise_floor: f64,

    pub cache_sizes: [usize; 3],
    pub cache_accesses: usize,
    pub cache_rounds: usize,

    pub thermal_samples: usize,
    pub thermal_workload_iterations: usize,
    pub thermal_warmup_iterations: usize,
    pub thermal_ratio_range: (f64, f64),

    pub jitter_trials: usize,
    pub jitter_iterations: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            clock_samples: 200,
            clock_workload_iterations: 5_000,
            clock_noise_floor: 0.0001,
            cache_sizes: [64 * 1024, 1024 * 1024, 16 * 1024 * 1024],
            cache_accesses: 200_000,
            cache_rounds: 5,
            thermal_samples: 50,
            thermal_workload_iterations: 10_000,
            thermal_warmup_iterations: 2_000_000,
            thermal_ratio_range: (0.5, 2.0),
            jitter_trials: 100,
            jitter_iterations: 10_000,
        }
    }
}

/// Runs a fixed list of checks sequentially.
pub struct FingerprintCollector {
    checks: Vec<Box<dyn HardwareCheck>>,
}

impl FingerprintCollector {
    pub fn with_checks(checks: Vec<Box<dyn HardwareCheck>>) -> Self {
        Self { checks }
    }

    /// The six native checks for this host, validating vector hardware
    /// against `claimed`.
    pub fn native(claimed: &CpuIdentity, config: &FingerprintConfig) -> Self {
        Self::with_checks(vec![
            Box::new(ClockDriftCheck::new(
                config.clock_samples,
                config.clock_workload_iterations,
                config.clock_noise_floor,
            )),
            Box::new(CacheTimingCheck::new(
                config.cache_sizes,
                config.cache_accesses,
                config.cache_rounds,
            )),
            Box::new(SimdIdentityCheck::for_identity(
                Box::new(NativeVectorProbe),
                claimed,
            )),
            Box::new(ThermalDriftCheck::new(
                config.thermal_samples,
                config.thermal_workload_iterations,
                config.thermal_warmup_iterations,
                config.thermal_ratio_range,
            )),
            Box::new(InstructionJitterCheck::new(
                config.jitter_trials,
                config.jitter_iterations,
            )),
            Box::new(AntiEmulationCheck::new(Box::new(SystemHostProbe::default()))),
        ])
    }

    pub fn collect(&self) -> FingerprintReport {
        let mut checks = BTreeMap::new();

        for check in &self.checks {
            let name = check.name();
            let result = match catch_unwind(AssertUnwindSafe(|| check.run())) {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(check = %name, error = %e, "Fingerprint check errored");
                    CheckResult::error()
                }
                Err(_) => {
                    warn!(check = %name, "Fingerprint check panicked");
                    CheckResult::error()
                }
            };
            debug!(
                check = %name,
                passed = result.passed,
                reason = result.fail_reason.as_deref().unwrap_or(""),
                "Fingerprint check finished"
            );
            checks.insert(name, result);
        }

        let report = FingerprintReport::from_checks(checks);
        info!(
            pass_count = report.pass_count(),
            all_passed = report.all_passed,
            "Fingerprint collection complete"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Check with a canned outcome.
    pub struct FixedCheck(pub CheckName, pub bool);

    impl HardwareCheck for FixedCheck {
        fn name(&self) -> CheckName {
            self.0
        }

        fn run(&self) -> Result<CheckResult> {
            if self.1 {
                Ok(CheckResult::pass(Metrics::new()))
            } else {
                Ok(CheckResult::fail("forced", Metrics::new()))
            }
        }
    }

    pub fn report_with_passes(pass_count: usize) -> FingerprintReport {
        let checks = CheckName::ALL
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let result = if i < pass_count {
                    CheckResult::pass(Metrics::new())
                } else {
                    CheckResult::fail("forced", Metrics::new())
                };
                (*name, result)
            })
            .collect();
        FingerprintReport::from_checks(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    struct ErroringCheck;

    impl HardwareCheck for ErroringCheck {
        fn name(&self) -> CheckName {
            CheckName::CacheTiming
        }

        fn run(&self) -> Result<CheckResult> {
            anyhow::bail!("buffer allocation failed")
        }
    }

    struct PanickingCheck;

    impl HardwareCheck for PanickingCheck {
        fn name(&self) -> CheckName {
            CheckName::ThermalDrift
        }

        fn run(&self) -> Result<CheckResult> {
            panic!("sensor exploded")
        }
    }

    #[test]
    fn test_pass_count_and_all_passed() {
        for n in 0..=6 {
            let report = report_with_passes(n);
            assert_eq!(report.pass_count(), n);
            assert_eq!(report.all_passed, n == 6);
            assert!(report.structural_problem().is_none());
        }
    }

    #[test]
    fn test_errors_and_panics_recorded_as_failures() {
        let collector = FingerprintCollector::with_checks(vec![
            Box::new(FixedCheck(CheckName::ClockDrift, true)),
            Box::new(ErroringCheck),
            Box::new(FixedCheck(CheckName::SimdIdentity, true)),
            Box::new(PanickingCheck),
            Box::new(FixedCheck(CheckName::InstructionJitter, true)),
            Box::new(FixedCheck(CheckName::AntiEmulation, true)),
        ]);

        let report = collector.collect();
        assert_eq!(report.pass_count(), 4);
        assert!(!report.all_passed);
        for name in [CheckName::CacheTiming, CheckName::ThermalDrift] {
            let result = report.get(name).unwrap();
            assert!(!result.passed);
            assert_eq!(result.fail_reason.as_deref(), Some(ERROR_REASON));
        }
    }

    #[test]
    fn test_missing_check_is_structural_problem() {
        let mut report = report_with_passes(6);
        report.checks.remove(&CheckName::AntiEmulation);
        let problem = report.structural_problem().unwrap();
        assert!(problem.contains("anti_emulation"));
        assert_eq!(report.pass_count(), 5);
    }

    #[test]
    fn test_lying_all_passed_flag_is_structural_problem() {
        let mut report = report_with_passes(5);
        report.all_passed = true;
        assert!(report.structural_problem().unwrap().contains("disagrees"));
    }

    #[test]
    fn test_report_json_shape() {
        let report = report_with_passes(6);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["all_passed"], true);
        for name in CheckName::ALL {
            assert_eq!(json["checks"][name.as_str()]["passed"], true);
        }

        let parsed: FingerprintReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
