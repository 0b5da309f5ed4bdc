//! Instruction path jitter.
//!
//! Pipelines, branch predictors and interrupts make short integer and float
//! loops vary run to run. Zero spread on both is a strong emulation signal.

use anyhow::{Result, ensure};
use std::hint::black_box;
use std::time::Instant;

use super::{CheckName, CheckResult, HardwareCheck, Metrics, stats};

pub struct InstructionJitterCheck {
    trials: usize,
    iterations: usize,
}

impl InstructionJitterCheck {
    pub fn new(trials: usize, iterations: usize) -> Self {
        Self { trials, iterations }
    }

    fn time<F: FnMut()>(mut workload: F) -> f64 {
        let start = Instant::now();
        workload();
        start.elapsed().as_nanos() as f64
    }

    fn int_ops(&self) -> f64 {
        Self::time(|| {
            let mut x: u64 = 1;
            for _ in 0..self.iterations {
                x = black_box(x.wrapping_mul(7).wrapping_add(13) % 65_537);
            }
        })
    }

    fn fp_ops(&self) -> f64 {
        Self::time(|| {
            let mut x: f64 = 1.5;
            for _ in 0..self.iterations {
                x = black_box((x * 1.414 + 0.5) % 1000.0);
            }
        })
    }

    fn branch_ops(&self) -> f64 {
        Self::time(|| {
            let mut x: i64 = 0;
            for i in 0..self.iterations {
                if black_box(i) % 2 == 0 {
                    x += 1;
                } else {
                    x -= 1;
                }
            }
            black_box(x);
        })
    }

    pub fn evaluate(int_times: &[f64], fp_times: &[f64], branch_times: &[f64]) -> CheckResult {
        let int_stdev = stats::stdev(int_times);
        let fp_stdev = stats::stdev(fp_times);
        let branch_stdev = stats::stdev(branch_times);

        let metrics = Metrics::from([
            ("int_mean_ns".to_string(), stats::mean(int_times)),
            ("fp_mean_ns".to_string(), stats::mean(fp_times)),
            ("branch_mean_ns".to_string(), stats::mean(branch_times)),
            ("int_stdev".to_string(), int_stdev),
            ("fp_stdev".to_string(), fp_stdev),
            ("branch_stdev".to_string(), branch_stdev),
        ]);

        if int_stdev > 0.0 && fp_stdev > 0.0 {
            CheckResult::pass(metrics)
        } else {
            CheckResult::fail("no_jitter", metrics)
        }
    }
}

impl HardwareCheck for InstructionJitterCheck {
    fn name(&self) -> CheckName {
        CheckName::InstructionJitter
    }

    fn run(&self) -> Result<CheckResult> {
        ensure!(self.trials >= 2, "instruction jitter needs at least 2 trials");
        let int_times: Vec<f64> = (0..self.trials).map(|_| self.int_ops()).collect();
        let fp_times: Vec<f64> = (0..self.trials).map(|_| self.fp_ops()).collect();
        let branch_times: Vec<f64> = (0..self.trials).map(|_| self.branch_ops()).collect();
        Ok(Self::evaluate(&int_times, &fp_times, &branch_times))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_workloads_must_jitter() {
        let noisy = [100.0, 104.0, 99.0];
        let flat = [100.0, 100.0, 100.0];

        assert!(InstructionJitterCheck::evaluate(&noisy, &noisy, &flat).passed);

        let int_flat = InstructionJitterCheck::evaluate(&flat, &noisy, &noisy);
        assert_eq!(int_flat.fail_reason.as_deref(), Some("no_jitter"));

        let fp_flat = InstructionJitterCheck::evaluate(&noisy, &flat, &noisy);
        assert!(!fp_flat.passed);
    }

    #[test]
    fn test_run_produces_metrics() {
        let result = InstructionJitterCheck::new(5, 500).run().unwrap();
        assert!(result.metric("branch_stdev").is_some());
        assert!(result.metric("int_mean_ns").unwrap() >= 0.0);
    }
}
