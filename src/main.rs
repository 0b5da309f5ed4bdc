use anyhow::{Context, Result};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::fmt::format::FmtSpan;

use antiquity_oracle::{
    InMemoryNonceStore, InMemoryWeightStore, NonceStore, OracleConfig, OracleVerifier,
    SecurityState, Verifier, WeightStore,
    api::{build_app, security_config},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - invalid constants must stop startup
    let config = Arc::new(OracleConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check the ANTIQUITY_* environment variables.");
        e
    })?);

    init_secure_logging(&config)?;

    info!("Starting Antiquity Oracle");
    info!(
        "Multiplier: grace={}y decay={} loyalty={}/y cap={} server={} floor={:e} hard_cap={}",
        config.multiplier.grace_period_years,
        config.multiplier.decay_rate,
        config.multiplier.loyalty_rate,
        config.multiplier.loyalty_cap,
        config.multiplier.server_bonus_rate,
        config.multiplier.floor_constant,
        config.multiplier.hard_cap,
    );
    if let Some(year) = config.attestation.current_year_override {
        info!("Scoring year pinned to {}", year);
    }

    let verifier: Arc<OracleVerifier> = Arc::new(Verifier::new(
        InMemoryNonceStore::with_capacity(
            config.attestation.challenge_ttl_secs,
            config.attestation.max_outstanding_challenges,
        ),
        InMemoryWeightStore::new(),
        config.verifier_config(),
    ));
    info!(
        "Classifier loaded with {} architecture rules",
        verifier.classifier().rules().count()
    );

    let security_state = SecurityState::new(security_config(&config));

    spawn_housekeeping(verifier.clone(), security_state.clone(), config.clone());

    let app = build_app(verifier, security_state);

    // Start the server on configured host/port
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Antiquity Oracle listening on {}", bind_addr);
    info!(
        "Security middleware: Rate limit={}/min, Max body={}KB, Challenge TTL={}s, Max challenges={}",
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024,
        config.attestation.challenge_ttl_secs,
        config.attestation.max_outstanding_challenges
    );
    if !config.security.trusted_proxies.is_empty() {
        info!("Forwarding headers trusted from {:?}", config.security.trusted_proxies);
    }

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging from configuration
fn init_secure_logging(config: &OracleConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Logging initialized with miner id sanitization enabled");
    }

    Ok(())
}

/// Periodically drop expired nonces, stale weight records and idle rate
/// limiter entries. Only bounds memory: TTLs are enforced on access.
fn spawn_housekeeping(verifier: Arc<OracleVerifier>, security: SecurityState, config: Arc<OracleConfig>) {
    let period = Duration::from_secs(config.attestation.housekeeping_interval_secs);
    let max_age = config.record_max_age();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = Utc::now();

            let nonces = verifier.nonces().evict_expired(now);
            let clients = security.rate_limiter.cleanup();
            match verifier.weights().evict_stale(now, max_age).await {
                Ok(records) => {
                    if nonces + clients + records > 0 {
                        debug!(nonces, clients, records, "Housekeeping evicted entries");
                    }
                }
                Err(e) => error!("Housekeeping failed to evict stale records: {}", e),
            }
        }
    });
}
