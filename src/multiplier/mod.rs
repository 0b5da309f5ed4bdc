//! Multiplier Engine
//!
//! Combines a classified [`CpuIdentity`] with age, uptime and fingerprint
//! results into one per-miner reward weight.
//!
//! ```text
//! base ─→ vintage_bonus ─→ age decay ─→ decayed_bonus ┐
//! uptime (modern only) ─→ loyalty_bonus ──────────────┼→ pre_penalty
//! is_server ─→ server factor ─────────────────────────┘       │
//! pass_count ─→ penalty table ───────────────────────────────→ × ─→ clamp
//! ```
//!
//! Every function here is pure: no clock reads, no shared state.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::classifier::CpuIdentity;

/// Number of fingerprint checks; also the highest possible pass count.
pub const CHECK_COUNT: usize = 6;

/// Canonical floor ("1 in 1,000,000,000").
pub const DEFAULT_FLOOR: f64 = 1e-9;

/// Tunable constants of the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiplierConfig {
    /// Years a CPU keeps its full vintage bonus.
    pub grace_period_years: u32,

    /// Fraction of the bonus lost per grace period past the first.
    pub decay_rate: f64,

    /// Loyalty earned per year of continuous attestation (modern CPUs only).
    pub loyalty_rate: f64,
    pub loyalty_cap: f64,

    pub server_bonus_rate: f64,

    pub floor_constant: f64,
    pub hard_cap: f64,

    /// Penalty factor indexed by pass count (0..=6).
    pub penalty_by_pass_count: [f64; CHECK_COUNT + 1],
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            grace_period_years: 5,
            decay_rate: 0.15,
            loyalty_rate: 0.15,
            loyalty_cap: 0.5,
            server_bonus_rate: 0.1,
            floor_constant: DEFAULT_FLOOR,
            hard_cap: 3.5,
            // 0-1 floor, 2-3 ~0.01, 4-5 ~0.1, 6 full weight; strictly increasing
            penalty_by_pass_count: [DEFAULT_FLOOR, 2e-9, 0.005, 0.01, 0.05, 0.1, 1.0],
        }
    }
}

impl MultiplierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grace_period_years == 0 {
            bail!("grace_period_years must be at least 1");
        }
        for (name, value) in [
            ("decay_rate", self.decay_rate),
            ("loyalty_rate", self.loyalty_rate),
            ("loyalty_cap", self.loyalty_cap),
            ("server_bonus_rate", self.server_bonus_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number, got {}", name, value);
            }
        }
        if !self.floor_constant.is_finite() || self.floor_constant <= 0.0 {
            bail!("floor_constant must be positive");
        }
        if !self.hard_cap.is_finite() || self.hard_cap <= self.floor_constant {
            bail!("hard_cap must be greater than floor_constant");
        }

        let table = &self.penalty_by_pass_count;
        if table[0] != self.floor_constant {
            bail!(
                "penalty for zero passing checks must equal floor_constant ({})",
                self.floor_constant
            );
        }
        if table[CHECK_COUNT] != 1.0 {
            bail!("penalty for all checks passing must be 1.0");
        }
        if table
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(std::cmp::Ordering::Less))
        {
            bail!("penalty table must be strictly increasing: {:?}", table);
        }
        Ok(())
    }
}

/// Everything that feeds one score, bundled.
#[derive(Debug, Clone)]
pub struct MultiplierInputs<'a> {
    pub identity: &'a CpuIdentity,
    pub current_year: i32,
    /// Years of continuous attestation.
    pub uptime_years: f64,
    pub pass_count: usize,
    /// Claim contradicts detected hardware; scored as zero passing checks.
    pub inconsistent_signals: bool,
}

/// Every intermediate value of one score, for auditing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiplierBreakdown {
    pub base_multiplier: f64,
    pub vintage_bonus: f64,
    pub age_years: i32,
    pub decay_factor: f64,
    pub decayed_bonus: f64,
    pub loyalty_bonus: f64,
    pub server_bonus_factor: f64,
    pub pre_penalty: f64,
    pub effective_pass_count: usize,
    pub penalty_factor: f64,
    pub final_multiplier: f64,
}

impl MultiplierBreakdown {
    /// The portion of the server factor above 1.0.
    pub fn server_bonus(&self) -> f64 {
        self.server_bonus_factor - 1.0
    }
}

// ============================================================================
// Pipeline Steps
// ============================================================================

pub fn vintage_bonus(base_multiplier: f64) -> f64 {
    if base_multiplier.is_finite() {
        (base_multiplier - 1.0).max(0.0)
    } else {
        0.0
    }
}

/// Age in whole years, clamped to zero for future or missing release years.
pub fn age_years(current_year: i32, release_year: Option<i32>) -> i32 {
    match release_year {
        Some(year) => (current_year - year).max(0),
        None => 0,
    }
}

pub fn decay_factor(age_years: i32, config: &MultiplierConfig) -> f64 {
    let grace = config.grace_period_years as f64;
    let age = age_years as f64;
    if age <= grace {
        return 1.0;
    }
    (1.0 - config.decay_rate * (age - grace) / grace).max(0.0)
}

/// Loyalty applies only to classified, non-vintage hardware.
pub fn loyalty_bonus(identity: &CpuIdentity, uptime_years: f64, config: &MultiplierConfig) -> f64 {
    if identity.is_unknown() || identity.is_vintage() {
        return 0.0;
    }
    let uptime = if uptime_years.is_finite() {
        uptime_years.max(0.0)
    } else {
        0.0
    };
    (uptime * config.loyalty_rate).min(config.loyalty_cap)
}

pub fn server_bonus_factor(identity: &CpuIdentity, config: &MultiplierConfig) -> f64 {
    if identity.is_server && !identity.is_unknown() {
        1.0 + config.server_bonus_rate
    } else {
        1.0
    }
}

pub fn penalty_factor(pass_count: usize, config: &MultiplierConfig) -> f64 {
    config.penalty_by_pass_count[pass_count.min(CHECK_COUNT)]
}

/// Run the whole pipeline.
pub fn compute(inputs: &MultiplierInputs<'_>, config: &MultiplierConfig) -> MultiplierBreakdown {
    let identity = inputs.identity;

    let base_multiplier = if identity.is_unknown() {
        1.0
    } else {
        identity.base_multiplier
    };
    let vintage = vintage_bonus(base_multiplier);
    let age = age_years(inputs.current_year, identity.release_year);
    let decay = decay_factor(age, config);
    let decayed = vintage * decay;
    let loyalty = loyalty_bonus(identity, inputs.uptime_years, config);
    let server_factor = server_bonus_factor(identity, config);
    let pre_penalty = (1.0 + decayed + loyalty) * server_factor;

    let effective_pass_count = if inputs.inconsistent_signals {
        0
    } else {
        inputs.pass_count.min(CHECK_COUNT)
    };
    let penalty = penalty_factor(effective_pass_count, config);
    let final_multiplier = clamp_multiplier(pre_penalty * penalty, config);

    MultiplierBreakdown {
        base_multiplier,
        vintage_bonus: vintage,
        age_years: age,
        decay_factor: decay,
        decayed_bonus: decayed,
        loyalty_bonus: loyalty,
        server_bonus_factor: server_factor,
        pre_penalty,
        effective_pass_count,
        penalty_factor: penalty,
        final_multiplier,
    }
}

fn clamp_multiplier(value: f64, config: &MultiplierConfig) -> f64 {
    if value.is_nan() {
        return config.floor_constant;
    }
    value.clamp(config.floor_constant, config.hard_cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    const EPS: f64 = 1e-9;

    fn score(brand: &str, current_year: i32, uptime_years: f64, pass_count: usize) -> MultiplierBreakdown {
        let identity = classify(brand);
        compute(
            &MultiplierInputs {
                identity: &identity,
                current_year,
                uptime_years,
                pass_count,
                inconsistent_signals: false,
            },
            &MultiplierConfig::default(),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(MultiplierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_penalty_tables_rejected() {
        let mut config = MultiplierConfig::default();
        config.penalty_by_pass_count[3] = config.penalty_by_pass_count[2];
        assert!(config.validate().is_err());

        let mut config = MultiplierConfig::default();
        config.penalty_by_pass_count[6] = 0.9;
        assert!(config.validate().is_err());

        let mut config = MultiplierConfig::default();
        config.grace_period_years = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_xeon_ivy_bridge_scenario() {
        // released 2012, scored in 2025
        let b = score("Intel(R) Xeon(R) CPU E5-1650 v2 @ 3.50GHz", 2025, 0.0, 6);
        assert_eq!(b.age_years, 13);
        assert!((b.base_multiplier - 1.1).abs() < EPS);
        assert!((b.decay_factor - 0.76).abs() < EPS);
        assert!((1.0 + b.decayed_bonus - 1.076).abs() < EPS);
        assert!((b.server_bonus_factor - 1.1).abs() < EPS);
        assert!((b.final_multiplier - 1.1836).abs() < EPS);
    }

    #[test]
    fn test_powerpc_g4_scenario() {
        let b = score("PowerPC G4 (7450)", 2025, 0.0, 6);
        assert_eq!(b.age_years, 24);
        assert!((b.decay_factor - 0.43).abs() < EPS);
        assert!((b.pre_penalty - 1.645).abs() < EPS);
        assert!((b.final_multiplier - 1.645).abs() < EPS);
    }

    #[test]
    fn test_modern_loyalty_scenario() {
        let b = score("AMD Ryzen 9 7950X", 2025, 3.0, 6);
        assert_eq!(b.base_multiplier, 1.0);
        assert!((b.loyalty_bonus - 0.45).abs() < EPS);
        assert!((b.final_multiplier - 1.45).abs() < EPS);
    }

    #[test]
    fn test_failed_checks_collapse_vintage_weight() {
        let b = score("PowerPC G4 (7450)", 2025, 0.0, 2);
        assert!(b.final_multiplier < 0.01);
        assert!(b.final_multiplier < 1.0 / 100.0 * b.pre_penalty);
    }

    #[test]
    fn test_unknown_only_penalized() {
        let config = MultiplierConfig::default();
        for pass_count in 0..=CHECK_COUNT {
            let b = score("FooBar CPU 9000", 2025, 10.0, pass_count);
            assert_eq!(b.vintage_bonus, 0.0);
            assert_eq!(b.loyalty_bonus, 0.0);
            assert_eq!(b.server_bonus_factor, 1.0);
            assert_eq!(b.pre_penalty, 1.0);
            assert_eq!(
                b.final_multiplier,
                config.penalty_by_pass_count[pass_count].max(config.floor_constant)
            );
        }
    }

    #[test]
    fn test_no_decay_within_grace_period() {
        let config = MultiplierConfig::default();
        for age in 0..=config.grace_period_years as i32 {
            assert_eq!(decay_factor(age, &config), 1.0);
        }
        let b = score("Apple M1", 2024, 0.0, 6);
        assert_eq!(b.decayed_bonus, b.vintage_bonus);
    }

    #[test]
    fn test_decay_bottoms_out_at_zero() {
        let config = MultiplierConfig::default();
        assert_eq!(decay_factor(200, &config), 0.0);
        let b = score("Motorola 68000", 2100, 0.0, 6);
        assert_eq!(b.decayed_bonus, 0.0);
        assert_eq!(b.final_multiplier, 1.0);
    }

    #[test]
    fn test_loyalty_saturates_at_cap() {
        let config = MultiplierConfig::default();
        let saturation = config.loyalty_cap / config.loyalty_rate;
        for uptime in [saturation, saturation + 0.5, 40.0] {
            let b = score("AMD Ryzen 9 7950X", 2025, uptime, 6);
            assert!((b.loyalty_bonus - config.loyalty_cap).abs() < EPS);
        }
    }

    #[test]
    fn test_vintage_excluded_from_loyalty() {
        let b = score("PowerPC G4 (7450)", 2025, 10.0, 6);
        assert_eq!(b.loyalty_bonus, 0.0);
    }

    #[test]
    fn test_future_release_year_clamped() {
        assert_eq!(age_years(2000, Some(2024)), 0);
        assert_eq!(age_years(2025, None), 0);
        let b = score("PowerPC G4 (7450)", 1990, 0.0, 6);
        assert_eq!(b.age_years, 0);
        assert!((b.final_multiplier - 2.5).abs() < EPS);
    }

    #[test]
    fn test_strictly_decreasing_in_failures() {
        for brand in [
            "PowerPC G4 (7450)",
            "Intel(R) Xeon(R) CPU E5-1650 v2 @ 3.50GHz",
            "AMD Ryzen 9 7950X",
            "FooBar CPU 9000",
            "Motorola 68000",
        ] {
            let finals: Vec<f64> = (0..=CHECK_COUNT)
                .map(|p| score(brand, 2025, 2.0, p).final_multiplier)
                .collect();
            for window in finals.windows(2) {
                assert!(window[0] < window[1], "{}: {:?}", brand, finals);
            }
        }
    }

    #[test]
    fn test_inconsistent_signals_take_floor_penalty() {
        let identity = classify("PowerPC G4 (7450)");
        let config = MultiplierConfig::default();
        let b = compute(
            &MultiplierInputs {
                identity: &identity,
                current_year: 2025,
                uptime_years: 0.0,
                pass_count: 6,
                inconsistent_signals: true,
            },
            &config,
        );
        assert_eq!(b.effective_pass_count, 0);
        assert_eq!(b.penalty_factor, config.floor_constant);
        assert!(b.final_multiplier < 1e-8);
    }

    #[test]
    fn test_final_multiplier_always_bounded() {
        let config = MultiplierConfig::default();
        for rule in crate::classifier::DEFAULT_RULES {
            for pass_count in 0..=CHECK_COUNT {
                for year in [1970, 2000, 2025, 2200] {
                    let b = score(rule.sample, year, 100.0, pass_count);
                    assert!(b.final_multiplier >= config.floor_constant);
                    assert!(b.final_multiplier <= config.hard_cap);
                }
            }
        }
    }
}
