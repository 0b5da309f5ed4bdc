//! Cache hierarchy timing.
//!
//! Walks a randomly permuted ring of cache lines (one dependent load per step)
//! in buffers sized past L1, past L2 and past L3. Physical caches produce
//! latencies that grow tier by tier; many emulators flatten them.

use anyhow::{Result, ensure};
use rand::seq::SliceRandom;
use std::hint::black_box;
use std::time::Instant;

use super::{CheckName, CheckResult, HardwareCheck, Metrics, stats};

const LINE_BYTES: usize = 64;
const WORDS_PER_LINE: usize = LINE_BYTES / std::mem::size_of::<usize>();

pub struct CacheTimingCheck {
    sizes: [usize; 3],
    accesses: usize,
    rounds: usize,
}

impl CacheTimingCheck {
    pub fn new(sizes: [usize; 3], accesses: usize, rounds: usize) -> Self {
        Self {
            sizes,
            accesses,
            rounds,
        }
    }

    /// Average nanoseconds per dependent load over a `size`-byte ring.
    fn measure(&self, size: usize) -> f64 {
        let lines = (size / LINE_BYTES).max(2);
        let mut order: Vec<usize> = (0..lines).collect();
        order.shuffle(&mut rand::thread_rng());

        // Each line's first word holds the word index of the next line.
        let mut ring = vec![0usize; lines * WORDS_PER_LINE];
        for pair in order.windows(2) {
            ring[pair[0] * WORDS_PER_LINE] = pair[1] * WORDS_PER_LINE;
        }
        ring[order[lines - 1] * WORDS_PER_LINE] = order[0] * WORDS_PER_LINE;

        let mut samples = Vec::with_capacity(self.rounds);
        let mut cursor = order[0] * WORDS_PER_LINE;
        for _ in 0..self.rounds {
            let start = Instant::now();
            for _ in 0..self.accesses {
                cursor = ring[cursor];
            }
            let elapsed = start.elapsed().as_nanos() as f64;
            samples.push(elapsed / self.accesses as f64);
        }
        black_box(cursor);
        stats::mean(&samples)
    }

    /// Scores per-tier latencies (nanoseconds per access).
    pub fn evaluate(l1_ns: f64, l2_ns: f64, l3_ns: f64) -> CheckResult {
        let ratio = |hi: f64, lo: f64| if lo > 0.0 { hi / lo } else { 0.0 };
        let metrics = Metrics::from([
            ("l1_ns".to_string(), l1_ns),
            ("l2_ns".to_string(), l2_ns),
            ("l3_ns".to_string(), l3_ns),
            ("l2_l1_ratio".to_string(), ratio(l2_ns, l1_ns)),
            ("l3_l2_ratio".to_string(), ratio(l3_ns, l2_ns)),
        ]);

        let tiers = [l1_ns, l2_ns, l3_ns];
        if tiers.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return CheckResult::fail("invalid_latency", metrics);
        }
        if l2_ns < l1_ns || l3_ns < l2_ns {
            return CheckResult::fail("no_cache_hierarchy", metrics);
        }
        CheckResult::pass(metrics)
    }
}

impl HardwareCheck for CacheTimingCheck {
    fn name(&self) -> CheckName {
        CheckName::CacheTiming
    }

    fn run(&self) -> Result<CheckResult> {
        ensure!(
            self.accesses > 0 && self.rounds > 0,
            "cache timing needs a positive access and round count"
        );
        ensure!(
            self.sizes.windows(2).all(|w| w[0] < w[1]),
            "cache buffer sizes must be increasing: {:?}",
            self.sizes
        );
        let [l1, l2, l3] = self.sizes.map(|size| self.measure(size));
        Ok(Self::evaluate(l1, l2, l3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_tiers_pass() {
        let result = CacheTimingCheck::evaluate(1.2, 4.5, 38.0);
        assert!(result.passed);
        assert!((result.metric("l2_l1_ratio").unwrap() - 3.75).abs() < 1e-12);
    }

    #[test]
    fn test_equal_tiers_pass() {
        assert!(CacheTimingCheck::evaluate(2.0, 2.0, 2.0).passed);
    }

    #[test]
    fn test_inverted_tiers_fail() {
        let result = CacheTimingCheck::evaluate(5.0, 3.0, 40.0);
        assert_eq!(result.fail_reason.as_deref(), Some("no_cache_hierarchy"));
    }

    #[test]
    fn test_zero_latency_fails() {
        let result = CacheTimingCheck::evaluate(0.0, 3.0, 40.0);
        assert_eq!(result.fail_reason.as_deref(), Some("invalid_latency"));
    }

    #[test]
    fn test_bad_sizes_is_error() {
        let check = CacheTimingCheck::new([1 << 20, 1 << 16, 1 << 24], 10, 1);
        assert!(check.run().is_err());
    }

    #[test]
    fn test_run_small_buffers() {
        let check = CacheTimingCheck::new([4 * 1024, 32 * 1024, 256 * 1024], 1_000, 2);
        let result = check.run().unwrap();
        for key in ["l1_ns", "l2_ns", "l3_ns"] {
            assert!(result.metric(key).is_some());
        }
    }
}
