//! SIMD / vector unit identity.
//!
//! Detects the vector instruction family at runtime and compares it with the
//! family the claimed CPU line shipped with. A G4 claim must show AltiVec, an
//! Apple M-series claim must show NEON, a Pentium II claim must show none.
//!
//! Probing differs per target, so it sits behind [`VectorProbe`].

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{CheckName, CheckResult, HardwareCheck, Metrics};
use crate::classifier::{CpuIdentity, Isa, VectorFamily};

pub const HAS_SSE: &str = "has_sse";
pub const HAS_AVX: &str = "has_avx";
pub const HAS_ALTIVEC: &str = "has_altivec";
pub const HAS_NEON: &str = "has_neon";

/// One-hot vector unit flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorCapabilities {
    pub has_sse: bool,
    pub has_avx: bool,
    pub has_altivec: bool,
    pub has_neon: bool,
}

impl VectorCapabilities {
    pub fn family(&self) -> VectorFamily {
        if self.has_altivec {
            VectorFamily::AltiVec
        } else if self.has_neon {
            VectorFamily::Neon
        } else if self.has_sse || self.has_avx {
            VectorFamily::SseAvx
        } else {
            VectorFamily::Scalar
        }
    }

    pub fn to_metrics(self) -> Metrics {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Metrics::from([
            (HAS_SSE.to_string(), flag(self.has_sse)),
            (HAS_AVX.to_string(), flag(self.has_avx)),
            (HAS_ALTIVEC.to_string(), flag(self.has_altivec)),
            (HAS_NEON.to_string(), flag(self.has_neon)),
        ])
    }

    /// Rebuild capabilities from submitted metrics. `None` if any flag is
    /// missing.
    pub fn from_metrics(metrics: &Metrics) -> Option<Self> {
        let flag = |key: &str| metrics.get(key).map(|v| *v > 0.5);
        Some(Self {
            has_sse: flag(HAS_SSE)?,
            has_avx: flag(HAS_AVX)?,
            has_altivec: flag(HAS_ALTIVEC)?,
            has_neon: flag(HAS_NEON)?,
        })
    }
}

/// Whether `detected` is plausible for a CPU line of `isa` that is expected to
/// expose `expected`.
///
/// With a declared expectation the families must match exactly. Without one,
/// only the ISA implied by the detected family is checked.
pub fn vector_matches_claim(expected: Option<VectorFamily>, isa: Isa, detected: VectorFamily) -> bool {
    match expected {
        Some(family) => family == detected,
        None => match detected.implied_isa() {
            Some(implied) => isa == Isa::Unknown || implied == isa,
            None => true,
        },
    }
}

/// Target-specific vector unit detection.
pub trait VectorProbe: Send + Sync {
    fn detect(&self) -> VectorCapabilities;
}

/// Probes the CPU this binary runs on.
pub struct NativeVectorProbe;

impl VectorProbe for NativeVectorProbe {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn detect(&self) -> VectorCapabilities {
        VectorCapabilities {
            has_sse: std::is_x86_feature_detected!("sse"),
            has_avx: std::is_x86_feature_detected!("avx"),
            ..Default::default()
        }
    }

    #[cfg(target_arch = "aarch64")]
    fn detect(&self) -> VectorCapabilities {
        VectorCapabilities {
            has_neon: std::arch::is_aarch64_feature_detected!("neon"),
            ..Default::default()
        }
    }

    #[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
    fn detect(&self) -> VectorCapabilities {
        let has_altivec = cfg!(target_feature = "altivec")
            || std::fs::read_to_string("/proc/cpuinfo")
                .map(|info| info.to_lowercase().contains("altivec supported"))
                .unwrap_or(false);
        VectorCapabilities {
            has_altivec,
            ..Default::default()
        }
    }

    #[cfg(not(any(
        target_arch = "x86",
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc",
        target_arch = "powerpc64"
    )))]
    fn detect(&self) -> VectorCapabilities {
        VectorCapabilities::default()
    }
}

pub struct SimdIdentityCheck {
    probe: Box<dyn VectorProbe>,
    expected: Option<VectorFamily>,
    isa: Isa,
}

impl SimdIdentityCheck {
    pub fn new(probe: Box<dyn VectorProbe>, expected: Option<VectorFamily>, isa: Isa) -> Self {
        Self {
            probe,
            expected,
            isa,
        }
    }

    pub fn for_identity(probe: Box<dyn VectorProbe>, claimed: &CpuIdentity) -> Self {
        Self::new(probe, claimed.expected_vector, claimed.isa)
    }
}

impl HardwareCheck for SimdIdentityCheck {
    fn name(&self) -> CheckName {
        CheckName::SimdIdentity
    }

    fn run(&self) -> Result<CheckResult> {
        let caps = self.probe.detect();
        let detected = caps.family();
        let metrics = caps.to_metrics();

        if vector_matches_claim(self.expected, self.isa, detected) {
            Ok(CheckResult::pass(metrics))
        } else {
            Ok(CheckResult::fail(
                format!("vector_mismatch: detected {}", detected.as_str()),
                metrics,
            ))
        }
    }
}
