//! Thermal drift entropy.
//!
//! Times a workload cold, heats the core with a sustained loop, then times it
//! again. Silicon under load shifts clocks and timing noise; the hot/cold
//! ratio must stay within physically plausible bounds and both phases must
//! show variance.

use anyhow::{Result, ensure};
use sha2::{Digest, Sha256};
use std::hint::black_box;
use std::time::Instant;

use super::{CheckName, CheckResult, HardwareCheck, Metrics, stats};

pub struct ThermalDriftCheck {
    samples: usize,
    workload_iterations: usize,
    warmup_iterations: usize,
    ratio_range: (f64, f64),
}

impl ThermalDriftCheck {
    pub fn new(
        samples: usize,
        workload_iterations: usize,
        warmup_iterations: usize,
        ratio_range: (f64, f64),
    ) -> Self {
        Self {
            samples,
            workload_iterations,
            warmup_iterations,
            ratio_range,
        }
    }

    fn phase(&self, tag: u8) -> Vec<f64> {
        (0..self.samples)
            .map(|i| {
                let data = [tag, (i & 0xff) as u8];
                let start = Instant::now();
                for _ in 0..self.workload_iterations {
                    black_box(Sha256::digest(black_box(data)));
                }
                start.elapsed().as_nanos() as f64
            })
            .collect()
    }

    fn warm_up(&self) {
        let mut hasher = Sha256::new();
        for i in 0..self.warmup_iterations {
            hasher.update(black_box(i).to_le_bytes());
        }
        black_box(hasher.finalize());
    }

    pub fn evaluate(&self, cold: &[f64], hot: &[f64]) -> CheckResult {
        let cold_mean = stats::mean(cold);
        let hot_mean = stats::mean(hot);
        let cold_stdev = stats::stdev(cold);
        let hot_stdev = stats::stdev(hot);
        let ratio = if cold_mean > 0.0 {
            hot_mean / cold_mean
        } else {
            0.0
        };

        let metrics = Metrics::from([
            ("cold_mean_ns".to_string(), cold_mean),
            ("hot_mean_ns".to_string(), hot_mean),
            ("cold_stdev".to_string(), cold_stdev),
            ("hot_stdev".to_string(), hot_stdev),
            ("drift_ratio".to_string(), ratio),
        ]);

        let (lo, hi) = self.ratio_range;
        if !ratio.is_finite() || ratio < lo || ratio > hi {
            return CheckResult::fail("implausible_ratio", metrics);
        }
        if cold_stdev == 0.0 || hot_stdev == 0.0 {
            return CheckResult::fail("no_thermal_variance", metrics);
        }
        CheckResult::pass(metrics)
    }
}

impl HardwareCheck for ThermalDriftCheck {
    fn name(&self) -> CheckName {
        CheckName::ThermalDrift
    }

    fn run(&self) -> Result<CheckResult> {
        ensure!(self.samples >= 2, "thermal drift needs at least 2 samples");
        ensure!(
            self.ratio_range.0 < self.ratio_range.1,
            "thermal ratio range is empty"
        );
        let cold = self.phase(b'c');
        self.warm_up();
        let hot = self.phase(b'h');
        Ok(self.evaluate(&cold, &hot))
    }
}
