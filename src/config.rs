use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use crate::attestation::challenge::DEFAULT_MAX_OUTSTANDING;
use crate::attestation::{EpochSchedule, VerifierConfig};
use crate::multiplier::{CHECK_COUNT, MultiplierConfig};

/// Configuration for the antiquity oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Challenge and record lifetimes
    pub attestation: AttestationConfig,
    /// Settlement epochs
    pub epochs: EpochSchedule,
    /// Multiplier engine constants
    pub multiplier: MultiplierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Reverse proxies whose forwarding headers identify the client
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Truncate miner ids in logs
    pub sanitize_logs: bool,
    /// Enable request span logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// Seconds a challenge nonce stays valid
    pub challenge_ttl_secs: u64,
    /// Largest gap between attestations that keeps a loyalty streak
    pub max_attestation_gap_hours: u64,
    /// Records not refreshed for this long are dropped
    pub record_max_age_days: u64,
    /// Fixed scoring year; the clock's year when unset
    pub current_year_override: Option<i32>,
    /// Period of the nonce / rate limiter / record cleanup task
    pub housekeeping_interval_secs: u64,
    /// Unexpired challenges held at once before new ones are refused
    pub max_outstanding_challenges: usize,
}

/// One year of hours
const MAX_ATTESTATION_GAP_HOURS: u64 = 24 * 366;
/// Ten years of days
const MAX_RECORD_AGE_DAYS: u64 = 3660;

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: 300,
            max_attestation_gap_hours: 48,
            record_max_age_days: 30,
            current_year_override: None,
            housekeeping_interval_secs: 60,
            max_outstanding_challenges: DEFAULT_MAX_OUTSTANDING,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8088,
            },
            security: SecurityConfig {
                rate_limit_per_minute: 60,
                max_request_size: 256 * 1024, // 256KB
                trusted_proxies: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
            attestation: AttestationConfig::default(),
            epochs: EpochSchedule::default(),
            multiplier: MultiplierConfig::default(),
        }
    }
}

/// Parse `key` through `lookup` if present.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<IpAddr>()
                .with_context(|| format!("Invalid ANTIQUITY_TRUSTED_PROXIES entry {:?}", v))
        })
        .collect()
}

fn parse_penalty_table(raw: &str) -> Result<[f64; CHECK_COUNT + 1]> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid ANTIQUITY_PENALTY_TABLE value")?;
    values.try_into().map_err(|v: Vec<f64>| {
        anyhow::anyhow!(
            "ANTIQUITY_PENALTY_TABLE needs {} comma-separated values, got {}",
            CHECK_COUNT + 1,
            v.len()
        )
    })
}

impl OracleConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = lookup("ANTIQUITY_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "ANTIQUITY_PORT")? {
            config.server.port = port;
        }

        // Security configuration
        if let Some(limit) = parse_var(&lookup, "ANTIQUITY_RATE_LIMIT_PER_MINUTE")? {
            config.security.rate_limit_per_minute = limit;
        }
        if let Some(size) = parse_var(&lookup, "ANTIQUITY_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = size;
        }
        if let Some(raw) = lookup("ANTIQUITY_TRUSTED_PROXIES") {
            config.security.trusted_proxies = parse_ip_list(&raw)?;
        }

        // Logging configuration
        if let Some(level) = lookup("ANTIQUITY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(sanitize) = parse_var(&lookup, "ANTIQUITY_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize;
        }
        if let Some(log_requests) = parse_var(&lookup, "ANTIQUITY_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }

        // Attestation lifetimes
        if let Some(ttl) = parse_var(&lookup, "ANTIQUITY_CHALLENGE_TTL_SECS")? {
            config.attestation.challenge_ttl_secs = ttl;
        }
        if let Some(hours) = parse_var(&lookup, "ANTIQUITY_MAX_ATTESTATION_GAP_HOURS")? {
            config.attestation.max_attestation_gap_hours = hours;
        }
        if let Some(days) = parse_var(&lookup, "ANTIQUITY_RECORD_MAX_AGE_DAYS")? {
            config.attestation.record_max_age_days = days;
        }
        if let Some(year) = parse_var(&lookup, "ANTIQUITY_CURRENT_YEAR")? {
            config.attestation.current_year_override = Some(year);
        }
        if let Some(secs) = parse_var(&lookup, "ANTIQUITY_HOUSEKEEPING_INTERVAL_SECS")? {
            config.attestation.housekeeping_interval_secs = secs;
        }
        if let Some(max) = parse_var(&lookup, "ANTIQUITY_MAX_OUTSTANDING_CHALLENGES")? {
            config.attestation.max_outstanding_challenges = max;
        }

        // Epochs
        if let Some(genesis) = parse_var(&lookup, "ANTIQUITY_EPOCH_GENESIS")? {
            config.epochs.genesis_unix = genesis;
        }
        if let Some(length) = parse_var(&lookup, "ANTIQUITY_EPOCH_LENGTH_SECS")? {
            config.epochs.length_secs = length;
        }

        // Multiplier engine
        let m = &mut config.multiplier;
        if let Some(years) = parse_var(&lookup, "ANTIQUITY_GRACE_PERIOD_YEARS")? {
            m.grace_period_years = years;
        }
        if let Some(rate) = parse_var(&lookup, "ANTIQUITY_DECAY_RATE")? {
            m.decay_rate = rate;
        }
        if let Some(rate) = parse_var(&lookup, "ANTIQUITY_LOYALTY_RATE")? {
            m.loyalty_rate = rate;
        }
        if let Some(cap) = parse_var(&lookup, "ANTIQUITY_LOYALTY_CAP")? {
            m.loyalty_cap = cap;
        }
        if let Some(rate) = parse_var(&lookup, "ANTIQUITY_SERVER_BONUS_RATE")? {
            m.server_bonus_rate = rate;
        }
        if let Some(floor) = parse_var::<f64>(&lookup, "ANTIQUITY_FLOOR")? {
            m.floor_constant = floor;
            // keep the default table consistent with a custom floor
            m.penalty_by_pass_count[0] = floor;
        }
        if let Some(cap) = parse_var(&lookup, "ANTIQUITY_HARD_CAP")? {
            m.hard_cap = cap;
        }
        if let Some(raw) = lookup("ANTIQUITY_PENALTY_TABLE") {
            m.penalty_by_pass_count = parse_penalty_table(&raw)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration ranges and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            bail!("Server host cannot be empty");
        }
        if self.server.port == 0 {
            bail!("Server port must be non-zero");
        }

        if self.security.rate_limit_per_minute == 0 {
            bail!("Rate limit must allow at least one request per minute");
        }
        if self.security.max_request_size < 1024 {
            bail!(
                "Maximum request size is too small ({} bytes, minimum 1024)",
                self.security.max_request_size
            );
        }

        let a = &self.attestation;
        if a.challenge_ttl_secs == 0 || a.challenge_ttl_secs > 3600 {
            bail!(
                "Challenge TTL must be between 1 and 3600 seconds, got {}",
                a.challenge_ttl_secs
            );
        }
        if a.max_attestation_gap_hours == 0 || a.max_attestation_gap_hours > MAX_ATTESTATION_GAP_HOURS {
            bail!(
                "Max attestation gap must be between 1 and {} hours, got {}",
                MAX_ATTESTATION_GAP_HOURS,
                a.max_attestation_gap_hours
            );
        }
        if a.record_max_age_days == 0 || a.record_max_age_days > MAX_RECORD_AGE_DAYS {
            bail!(
                "Record max age must be between 1 and {} days, got {}",
                MAX_RECORD_AGE_DAYS,
                a.record_max_age_days
            );
        }
        if a.max_outstanding_challenges == 0 {
            bail!("Max outstanding challenges must be non-zero");
        }
        if a.housekeeping_interval_secs == 0 {
            bail!("Housekeeping interval must be non-zero");
        }
        if let Some(year) = a.current_year_override {
            if !(1970..=9999).contains(&year) {
                bail!("Current year override out of range: {}", year);
            }
        }

        if self.epochs.length_secs == 0 {
            bail!("Epoch length must be non-zero");
        }

        self.multiplier
            .validate()
            .context("Invalid multiplier configuration")?;

        Ok(())
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            multiplier: self.multiplier.clone(),
            current_year_override: self.attestation.current_year_override,
            max_attestation_gap: i64::try_from(self.attestation.max_attestation_gap_hours)
                .ok()
                .and_then(Duration::try_hours)
                .unwrap_or(Duration::MAX),
            epochs: self.epochs,
        }
    }

    pub fn record_max_age(&self) -> Duration {
        i64::try_from(self.attestation.record_max_age_days)
            .ok()
            .and_then(Duration::try_days)
            .unwrap_or(Duration::MAX)
    }
}

const MAX_LOGGED_CHARS: usize = 24;

/// Make a client-supplied identifier safe to log: control characters are
/// replaced and long values are shortened to head and tail.
pub fn sanitize_for_logging(data: &str) -> String {
    let cleaned: String = data
        .chars()
        .map(|c| if c.is_control() { '?' } else { c })
        .collect();

    let count = cleaned.chars().count();
    if count <= MAX_LOGGED_CHARS {
        return cleaned;
    }
    let head: String = cleaned.chars().take(12).collect();
    let tail: String = cleaned.chars().skip(count - 6).collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("miner-g4-01"), "miner-g4-01");
        assert_eq!(sanitize_for_logging("bad\nid"), "bad?id");
        let long = "RTC-miner-0123456789abcdef0123456789";
        let shown = sanitize_for_logging(long);
        assert_eq!(shown, "RTC-miner-01...456789");
        // multi-byte characters are not split
        assert!(sanitize_for_logging(&"é".repeat(40)).contains("..."));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(OracleConfig::default().validate().is_ok());
        let config = OracleConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.attestation.challenge_ttl_secs, 300);
    }

    #[test]
    fn test_env_overrides() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("ANTIQUITY_HOST", "0.0.0.0"),
            ("ANTIQUITY_PORT", "9000"),
            ("ANTIQUITY_CHALLENGE_TTL_SECS", "120"),
            ("ANTIQUITY_CURRENT_YEAR", "2025"),
            ("ANTIQUITY_DECAY_RATE", "0.2"),
            ("ANTIQUITY_PENALTY_TABLE", "1e-9, 1e-8, 1e-3, 0.01, 0.1, 0.5, 1.0"),
        ]))
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.attestation.challenge_ttl_secs, 120);
        assert_eq!(config.attestation.current_year_override, Some(2025));
        assert_eq!(config.multiplier.decay_rate, 0.2);
        assert_eq!(config.multiplier.penalty_by_pass_count[5], 0.5);

        let verifier = config.verifier_config();
        assert_eq!(verifier.current_year_override, Some(2025));
        assert_eq!(verifier.max_attestation_gap, Duration::hours(48));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("ANTIQUITY_PORT"));

        assert!(OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_PORT", "0")])).is_err());
        assert!(OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_CHALLENGE_TTL_SECS", "0")])).is_err());
        assert!(OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_PENALTY_TABLE", "1,2,3")])).is_err());
        // not strictly increasing
        assert!(
            OracleConfig::from_lookup(lookup_from(&[(
                "ANTIQUITY_PENALTY_TABLE",
                "1e-9, 0.5, 0.4, 0.6, 0.7, 0.8, 1.0"
            )]))
            .is_err()
        );
    }

    #[test]
    fn test_huge_lifetimes_rejected_without_panic() {
        let err = OracleConfig::from_lookup(lookup_from(&[(
            "ANTIQUITY_MAX_ATTESTATION_GAP_HOURS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("Max attestation gap"));

        let err = OracleConfig::from_lookup(lookup_from(&[(
            "ANTIQUITY_RECORD_MAX_AGE_DAYS",
            "9223372036854775807",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("Record max age"));

        // unvalidated values saturate instead of overflowing
        let mut config = OracleConfig::default();
        config.attestation.max_attestation_gap_hours = u64::MAX;
        config.attestation.record_max_age_days = u64::MAX;
        assert_eq!(config.verifier_config().max_attestation_gap, Duration::MAX);
        assert_eq!(config.record_max_age(), Duration::MAX);
    }

    #[test]
    fn test_trusted_proxies_and_challenge_cap() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("ANTIQUITY_TRUSTED_PROXIES", "10.0.0.2, ::1"),
            ("ANTIQUITY_MAX_OUTSTANDING_CHALLENGES", "500"),
        ]))
        .unwrap();
        assert_eq!(
            config.security.trusted_proxies,
            vec!["10.0.0.2".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert_eq!(config.attestation.max_outstanding_challenges, 500);

        let err = OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_TRUSTED_PROXIES", "proxy.local")]))
            .unwrap_err();
        assert!(err.to_string().contains("ANTIQUITY_TRUSTED_PROXIES"));
        assert!(
            OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_MAX_OUTSTANDING_CHALLENGES", "0")])).is_err()
        );
    }

    #[test]
    fn test_custom_floor_carries_into_table() {
        let config = OracleConfig::from_lookup(lookup_from(&[("ANTIQUITY_FLOOR", "1e-12")])).unwrap();
        assert_eq!(config.multiplier.floor_constant, 1e-12);
        assert_eq!(config.multiplier.penalty_by_pass_count[0], 1e-12);
    }
}
