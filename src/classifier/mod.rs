//! Architecture Classifier
//!
//! Deterministic mapping from a free-text CPU brand string to a canonical
//! [`CpuIdentity`].
//!
//! ```text
//! "Intel(R) Xeon(R) CPU E5-1650 v2 @ 3.50GHz"
//!          ↓ normalize()
//! "intel xeon e5-1650 v2"
//!          ↓ ordered rule table (lowest priority number wins)
//! ivy_bridge / 2012 / base 1.1
//!          ↓ server markers
//! is_server = true
//! ```
//!
//! Classification never fails: a brand string no rule matches yields the
//! neutral `unknown` identity with a 1.0 base multiplier.

pub mod rules;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

pub use rules::{ArchRule, DEFAULT_RULES, SERVER_MARKERS};

/// Highest base multiplier a rule may declare.
pub const MAX_BASE_MULTIPLIER: f64 = 3.0;

pub const UNKNOWN_ARCHITECTURE: &str = "unknown";

// ============================================================================
// Identity Types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Intel,
    Amd,
    Apple,
    #[serde(rename = "powerpc")]
    PowerPc,
    Ibm,
    Motorola,
    Sun,
    Mips,
    Dec,
    Hp,
    Cyrix,
    Via,
    Transmeta,
    Idt,
    Unknown,
}

/// Instruction set family, used to cross-check claims against detected
/// vector hardware.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Isa {
    X86,
    Arm,
    #[serde(rename = "powerpc")]
    PowerPc,
    Sparc,
    Mips,
    Alpha,
    #[serde(rename = "pa_risc")]
    PaRisc,
    M68k,
    Unknown,
}

impl Isa {
    /// Parse a miner-supplied device family (`"x86_64"`, `"PowerPC"`,
    /// `"aarch64"`...). Returns `None` for anything unrecognized.
    pub fn from_claim(family: &str) -> Option<Self> {
        let family = family.trim().to_lowercase();
        let isa = match family.as_str() {
            "x86" | "x86_64" | "x86-64" | "amd64" | "i386" | "i486" | "i586" | "i686" | "intel"
            | "amd" => Isa::X86,
            "arm" | "arm64" | "aarch64" | "apple silicon" | "apple" => Isa::Arm,
            "powerpc" | "ppc" | "ppc64" | "ppc64le" | "power" | "powerpc64" => Isa::PowerPc,
            "sparc" | "sparc64" => Isa::Sparc,
            "mips" | "mips64" | "mipsel" => Isa::Mips,
            "alpha" => Isa::Alpha,
            "pa-risc" | "parisc" | "hppa" => Isa::PaRisc,
            "m68k" | "68k" => Isa::M68k,
            _ => return None,
        };
        Some(isa)
    }
}

/// Vector instruction family a CPU line is expected to expose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VectorFamily {
    #[serde(rename = "sse_avx")]
    SseAvx,
    #[serde(rename = "altivec")]
    AltiVec,
    #[serde(rename = "neon")]
    Neon,
    /// No vector unit.
    #[serde(rename = "none")]
    Scalar,
}

impl VectorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorFamily::SseAvx => "sse_avx",
            VectorFamily::AltiVec => "altivec",
            VectorFamily::Neon => "neon",
            VectorFamily::Scalar => "none",
        }
    }

    /// ISA implied by the presence of this vector family, if any.
    pub fn implied_isa(&self) -> Option<Isa> {
        match self {
            VectorFamily::SseAvx => Some(Isa::X86),
            VectorFamily::AltiVec => Some(Isa::PowerPc),
            VectorFamily::Neon => Some(Isa::Arm),
            VectorFamily::Scalar => None,
        }
    }
}

/// Static description of one CPU line, shared by every rule that maps to it.
#[derive(Debug, Clone, Copy)]
pub struct ArchRecord {
    pub vendor: Vendor,
    pub architecture: &'static str,
    pub generation: &'static str,
    pub release_year: i32,
    pub base_multiplier: f64,
    pub isa: Isa,
    /// `None` when the line shipped both with and without a vector unit.
    pub vector: Option<VectorFamily>,
}

/// Canonical identity of a claimed CPU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuIdentity {
    pub vendor: Vendor,
    pub architecture: String,
    pub generation: String,
    /// `None` only for the unknown identity.
    pub release_year: Option<i32>,
    pub is_server: bool,
    pub base_multiplier: f64,
    pub isa: Isa,
    pub expected_vector: Option<VectorFamily>,
    /// Priority of the rule that produced this identity.
    pub rule_priority: Option<u32>,
}

impl CpuIdentity {
    pub fn unknown() -> Self {
        Self {
            vendor: Vendor::Unknown,
            architecture: UNKNOWN_ARCHITECTURE.to_string(),
            generation: "Unknown".to_string(),
            release_year: None,
            is_server: false,
            base_multiplier: 1.0,
            isa: Isa::Unknown,
            expected_vector: None,
            rule_priority: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.architecture == UNKNOWN_ARCHITECTURE
    }

    /// Vintage lines (base above 1.0) are excluded from loyalty.
    pub fn is_vintage(&self) -> bool {
        self.base_multiplier > 1.0
    }

    fn from_rule(rule: &ArchRule, is_server: bool) -> Self {
        let record = rule.record;
        Self {
            vendor: record.vendor,
            architecture: record.architecture.to_string(),
            generation: record.generation.to_string(),
            release_year: Some(record.release_year),
            is_server,
            base_multiplier: record.base_multiplier,
            isa: record.isa,
            expected_vector: record.vector,
            rule_priority: Some(rule.priority),
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

static TRADEMARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((r|tm|c)\)|®|™|©").expect("static pattern"));
static CLOCK_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(\.\d+)?\s*[mg]hz\b").expect("static pattern"));
static NOISE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(cpu|processor)\b").expect("static pattern"));

/// Lowercase, strip trademark markers, `@ <clock>` suffixes, clock tokens and
/// `CPU`/`Processor` noise words, then collapse whitespace.
pub fn normalize(brand: &str) -> String {
    let lowered = brand.to_lowercase();
    let stripped = TRADEMARKS.replace_all(&lowered, "");
    let before_clock = match stripped.find('@') {
        Some(idx) => &stripped[..idx],
        None => &stripped[..],
    };
    let no_clock = CLOCK_TOKENS.replace_all(before_clock, " ");
    let no_noise = NOISE_WORDS.replace_all(&no_clock, " ");
    no_noise.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Classifier
// ============================================================================

/// Error building a rule table. Only ever produced by a defective table.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTableError {
    DuplicatePriority(u32),
    InvalidPattern { priority: u32, message: String },
    BaseOutOfRange { priority: u32, base: f64 },
}

impl std::fmt::Display for RuleTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleTableError::DuplicatePriority(p) => write!(f, "Duplicate rule priority: {}", p),
            RuleTableError::InvalidPattern { priority, message } => {
                write!(f, "Rule {} has an invalid pattern: {}", priority, message)
            }
            RuleTableError::BaseOutOfRange { priority, base } => write!(
                f,
                "Rule {} base multiplier {} outside [1.0, {}]",
                priority, base, MAX_BASE_MULTIPLIER
            ),
        }
    }
}

impl std::error::Error for RuleTableError {}

struct CompiledRule {
    rule: ArchRule,
    regex: Regex,
}

/// Ordered, compiled rule table.
pub struct ArchitectureClassifier {
    rules: Vec<CompiledRule>,
    server: Regex,
}

static BUILTIN: LazyLock<ArchitectureClassifier> = LazyLock::new(|| {
    ArchitectureClassifier::from_rules(DEFAULT_RULES).expect("built-in rule table is valid")
});

impl ArchitectureClassifier {
    /// Compile a rule table. Rules are sorted by priority so the order they are
    /// listed in never affects the outcome.
    pub fn from_rules(rules: &[ArchRule]) -> Result<Self, RuleTableError> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if !seen.insert(rule.priority) {
                return Err(RuleTableError::DuplicatePriority(rule.priority));
            }
            let base = rule.record.base_multiplier;
            if !base.is_finite() || !(1.0..=MAX_BASE_MULTIPLIER).contains(&base) {
                return Err(RuleTableError::BaseOutOfRange {
                    priority: rule.priority,
                    base,
                });
            }
            let regex = Regex::new(rule.pattern).map_err(|e| RuleTableError::InvalidPattern {
                priority: rule.priority,
                message: e.to_string(),
            })?;
            compiled.push(CompiledRule { rule: *rule, regex });
        }

        compiled.sort_by_key(|c| c.rule.priority);

        let server = Regex::new(SERVER_MARKERS).map_err(|e| RuleTableError::InvalidPattern {
            priority: 0,
            message: e.to_string(),
        })?;

        Ok(Self {
            rules: compiled,
            server,
        })
    }

    /// The compiled built-in table.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    pub fn classify(&self, brand: &str) -> CpuIdentity {
        let normalized = normalize(brand);
        match self.rules.iter().find(|c| c.regex.is_match(&normalized)) {
            Some(compiled) => {
                let is_server = self.server.is_match(&normalized);
                CpuIdentity::from_rule(&compiled.rule, is_server)
            }
            None => CpuIdentity::unknown(),
        }
    }

    /// Every rule matching `brand`, in resolution order. The first entry is
    /// the one `classify` picks.
    pub fn conflicts(&self, brand: &str) -> Vec<&ArchRule> {
        let normalized = normalize(brand);
        self.rules
            .iter()
            .filter(|c| c.regex.is_match(&normalized))
            .map(|c| &c.rule)
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &ArchRule> {
        self.rules.iter().map(|c| &c.rule)
    }
}

/// Classify against the built-in table.
pub fn classify(brand: &str) -> CpuIdentity {
    BUILTIN.classify(brand)
}
