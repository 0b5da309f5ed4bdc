//! Miner-side collector: classifies this host's CPU, runs the six hardware
//! checks and prints the FingerprintReport as JSON on stdout.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::process::Command;
use tracing::{Level, info, warn};

use antiquity_oracle::{FingerprintCollector, FingerprintConfig, classify};

#[derive(Debug, clap::Parser)]
#[command(name = "fingerprint", about = "Collect a hardware fingerprint report")]
struct Cli {
    /// CPU brand string; read from the OS when omitted
    #[arg(long)]
    brand: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Use reduced iteration counts (faster, noisier)
    #[arg(long)]
    quick: bool,

    /// Log level written to stderr
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let brand = match cli.brand {
        Some(brand) => brand,
        None => detect_brand_string().context("Could not read the CPU brand string, pass --brand")?,
    };
    let identity = classify(&brand);
    info!(
        brand = %brand,
        architecture = %identity.architecture,
        release_year = ?identity.release_year,
        "Classified host CPU"
    );
    if identity.is_unknown() {
        warn!("Brand string matched no architecture rule; the oracle will score it as unknown");
    }

    let config = if cli.quick {
        quick_config()
    } else {
        FingerprintConfig::default()
    };
    let report = FingerprintCollector::native(&identity, &config).collect();

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    Ok(())
}

fn quick_config() -> FingerprintConfig {
    FingerprintConfig {
        clock_samples: 64,
        clock_workload_iterations: 1_000,
        cache_accesses: 50_000,
        cache_rounds: 3,
        thermal_samples: 20,
        thermal_warmup_iterations: 200_000,
        jitter_trials: 40,
        jitter_iterations: 2_000,
        ..FingerprintConfig::default()
    }
}

/// Brand string as the OS reports it.
fn detect_brand_string() -> Result<String> {
    if cfg!(target_os = "macos") {
        let output = Command::new("sysctl")
            .args(["-n", "machdep.cpu.brand_string"])
            .output()
            .context("Failed to run sysctl")?;
        let brand = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !brand.is_empty() {
            return Ok(brand);
        }
        bail!("sysctl returned no brand string");
    }

    if cfg!(target_os = "windows") {
        match Command::new("reg")
            .args(["query", WINDOWS_CPU_KEY, "/v", "ProcessorNameString"])
            .output()
        {
            Ok(output) => {
                if let Some(brand) = brand_from_reg_query(&String::from_utf8_lossy(&output.stdout)) {
                    return Ok(brand);
                }
                warn!("Registry query returned no ProcessorNameString");
            }
            Err(e) => warn!("Failed to run reg query: {}", e),
        }
    }

    if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
        if let Some(brand) = brand_from_cpuinfo(&cpuinfo) {
            return Ok(brand);
        }
    }

    // Family/model/stepping only; classifies as unknown
    if let Ok(identifier) = std::env::var("PROCESSOR_IDENTIFIER") {
        if !identifier.trim().is_empty() {
            warn!("Falling back to PROCESSOR_IDENTIFIER, pass --brand for a vintage rating");
            return Ok(identifier.trim().to_string());
        }
    }

    bail!("no brand string source available on this platform")
}

const WINDOWS_CPU_KEY: &str = r"HKLM\HARDWARE\DESCRIPTION\System\CentralProcessor\0";

/// Value of `ProcessorNameString` in `reg query` output:
/// `    ProcessorNameString    REG_SZ    Intel(R) Core(TM) i7-8700K ...`
fn brand_from_reg_query(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("ProcessorNameString")?;
        let (_, value) = rest.split_once("REG_SZ")?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// `model name` on x86 and ARM; PowerPC kernels report `cpu : 7450, altivec
/// supported`, which is rewritten so the classifier sees the part number.
fn brand_from_cpuinfo(cpuinfo: &str) -> Option<String> {
    let field = |name: &str| {
        cpuinfo.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
    };

    if let Some(model) = field("model name").filter(|m| !m.is_empty()) {
        return Some(model);
    }
    let cpu = field("cpu").filter(|c| !c.is_empty())?;
    let part = cpu.split(',').next().unwrap_or(&cpu).trim().to_string();
    if part.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        Some(format!("PowerPC ({})", part))
    } else {
        Some(part)
    }
}
