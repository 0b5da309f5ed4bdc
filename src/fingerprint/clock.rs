//! Clock-skew / oscillator drift.
//!
//! Real crystals and power management make a fixed workload take a slightly
//! different time on every run. Emulators with virtualized time sources tend to
//! report near-identical durations.

use anyhow::{Result, ensure};
use sha2::{Digest, Sha256};
use std::hint::black_box;
use std::time::Instant;

use super::{CheckName, CheckResult, HardwareCheck, Metrics, stats};

pub const MIN_SAMPLES: usize = 64;

pub struct ClockDriftCheck {
    samples: usize,
    workload_iterations: usize,
    noise_floor: f64,
}

impl ClockDriftCheck {
    pub fn new(samples: usize, workload_iterations: usize, noise_floor: f64) -> Self {
        Self {
            samples,
            workload_iterations,
            noise_floor,
        }
    }

    fn time_workload(&self, seed: usize) -> f64 {
        let data = seed.to_le_bytes();
        let start = Instant::now();
        for _ in 0..self.workload_iterations {
            black_box(Sha256::digest(black_box(data)));
        }
        start.elapsed().as_nanos() as f64
    }

    /// Scores a set of interval measurements (nanoseconds).
    pub fn evaluate(&self, intervals: &[f64]) -> CheckResult {
        let mean_ns = stats::mean(intervals);
        let stdev_ns = stats::stdev(intervals);
        let cv = stats::coefficient_of_variation(intervals);
        let drift_stdev = stats::stdev(&stats::deltas(intervals));

        let metrics = Metrics::from([
            ("mean_ns".to_string(), mean_ns),
            ("stdev_ns".to_string(), stdev_ns),
            ("cv".to_string(), cv),
            ("drift_stdev".to_string(), drift_stdev),
        ]);

        if !cv.is_finite() || !drift_stdev.is_finite() {
            return CheckResult::fail("non_finite", metrics);
        }
        if cv < self.noise_floor {
            return CheckResult::fail("synthetic_timing", metrics);
        }
        if drift_stdev == 0.0 {
            return CheckResult::fail("no_drift", metrics);
        }
        CheckResult::pass(metrics)
    }
}

impl HardwareCheck for ClockDriftCheck {
    fn name(&self) -> CheckName {
        CheckName::ClockDrift
    }

    fn run(&self) -> Result<CheckResult> {
        ensure!(
            self.samples >= MIN_SAMPLES,
            "clock drift needs at least {} samples, configured {}",
            MIN_SAMPLES,
            self.samples
        );
        let intervals: Vec<f64> = (0..self.samples).map(|i| self.time_workload(i)).collect();
        Ok(self.evaluate(&intervals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check() -> ClockDriftCheck {
        ClockDriftCheck::new(64, 10, 0.0001)
    }

    #[test]
    fn test_constant_timing_fails() {
        let result = check().evaluate(&[1000.0; 64]);
        assert!(!result.passed);
        assert_eq!(result.fail_reason.as_deref(), Some("synthetic_timing"));
    }

    #[test]
    fn test_noisy_timing_passes() {
        let intervals: Vec<f64> = (0..64).map(|i| 1000.0 + ((i * 37) % 11) as f64 * 3.0).collect();
        let result = check().evaluate(&intervals);
        assert!(result.passed, "{:?}", result);
        assert!(result.metric("cv").unwrap() > 0.0001);
    }

    #[test]
    fn test_linear_ramp_has_no_drift() {
        // Constant deltas: measurable spread, zero drift variance.
        let intervals: Vec<f64> = (0..64).map(|i| 1000.0 + i as f64 * 10.0).collect();
        let result = check().evaluate(&intervals);
        assert!(!result.passed);
        assert_eq!(result.fail_reason.as_deref(), Some("no_drift"));
    }

    #[test]
    fn test_too_few_samples_is_error() {
        assert!(ClockDriftCheck::new(10, 10, 0.0001).run().is_err());
    }

    #[test]
    fn test_run_produces_metrics() {
        let result = check().run().unwrap();
        for key in ["mean_ns", "stdev_ns", "cv", "drift_stdev"] {
            assert!(result.metric(key).is_some(), "missing {}", key);
        }
    }
}
