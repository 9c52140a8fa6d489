//! Vigil Sentinel - Main entry point
//!
//! Runs the budgeted scan loop and reacts to threat-level transitions
//! with rebalancing and shield withdrawals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command};
use ethers::types::Address;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_chainio::{
    Chain, ChainWriter, DryRunWriter, EvmReader, EvmWriter, HttpFetcher, ThreatChangeEvent,
    ThreatLevel,
};
use vigil_sentinel::{
    ChainContext, CycleSummary, Rebalancer, Result, ScanOrchestrator, SentinelConfig,
    SentinelError, ShieldDispatcher, SignalFetcher, VERSION,
};

/// Per-chain reaction wiring for threat-level transitions
struct Responder {
    shield: ShieldDispatcher,
    rebalancer: Rebalancer,
    adapter_addresses: HashMap<String, Address>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("sentinel")
        .version(VERSION)
        .about("Vigil Sentinel - risk monitoring and automated defense")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Run in dry-run mode (no on-chain writes)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single scan cycle and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("OUTPUT")
                .help("Generate example config and exit"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .get_matches();

    // Initialize logging
    let log_level = matches.get_one::<String>("log-level").map(String::as_str);
    init_logging(log_level.unwrap_or("info"));

    // Handle config generation
    if let Some(output_path) = matches.get_one::<String>("generate-config") {
        let config = SentinelConfig::default();
        config.save_to_file(output_path)?;
        info!("Generated example config at: {}", output_path);
        return Ok(());
    }

    info!(version = VERSION, "🛡️  Vigil Sentinel starting...");

    // Load configuration
    let config = if let Some(config_path) = matches.get_one::<String>("config") {
        info!("Loading config from: {}", config_path);
        SentinelConfig::from_file(config_path)?
    } else {
        SentinelConfig::from_env_or_default()?
    };

    let dry_run = matches.get_flag("dry-run");
    if dry_run {
        warn!("🔶 Running in DRY-RUN mode - no on-chain writes will be submitted");
    }

    let signer_key = if dry_run {
        None
    } else {
        let var = &config.scan.signer_key_env;
        Some(std::env::var(var).map_err(|_| {
            SentinelError::internal(format!("signer key env var {var} not set"))
        })?)
    };

    // Wire up per-chain I/O and reaction paths
    let mut chains = Vec::new();
    let mut responders = HashMap::new();

    for targets in &config.chains {
        let chain = targets.chain;
        info!(%chain, adapters = targets.adapters.len(), "connecting chain");

        let reader = Arc::new(EvmReader::connect(&targets.rpc_url)?);
        let writer: Arc<dyn ChainWriter> = match &signer_key {
            Some(key) => Arc::new(EvmWriter::connect(&targets.rpc_url, key, chain.chain_id())?),
            None => Arc::new(DryRunWriter),
        };

        let vault = targets.vault_address()?;
        let registry = targets.registry_address()?;
        let mut adapter_addresses = HashMap::new();
        for adapter in &targets.adapters {
            adapter_addresses.insert(adapter.name.clone(), adapter.address()?);
        }

        responders.insert(
            chain,
            Responder {
                shield: ShieldDispatcher::new(writer.clone(), config.shield.clone(), vault),
                rebalancer: Rebalancer::new(
                    reader.clone(),
                    writer.clone(),
                    config.shield.clone(),
                    vault,
                    registry,
                    adapter_addresses.values().copied().collect(),
                ),
                adapter_addresses,
            },
        );

        chains.push(ChainContext {
            targets: targets.clone(),
            reader,
            writer,
        });
    }

    let endpoints = config.primary_endpoints().cloned().unwrap_or_default();
    let fetcher = Arc::new(HttpFetcher::new()?);
    let signals = SignalFetcher::new(
        fetcher,
        endpoints,
        Duration::from_secs(config.offchain.timeout_secs),
    );

    let orchestrator = ScanOrchestrator::new(chains, signals, config.scan.clone());
    let once = matches.get_flag("once");

    info!(
        interval_secs = config.scan.interval_secs,
        read_budget = config.scan.read_budget,
        "🚀 Sentinel ready"
    );

    // Set up graceful shutdown
    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = run_scan_loop(&orchestrator, &responders, config.scan.interval_secs, once) => {
            info!("Scan loop stopped");
            result?;
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received");
        }
    }

    info!("Vigil Sentinel stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level: {}. Using 'info'", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vigil_sentinel={level},vigil_chainio={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Main scan loop
async fn run_scan_loop(
    orchestrator: &ScanOrchestrator,
    responders: &HashMap<Chain, Responder>,
    interval_secs: u64,
    once: bool,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match orchestrator.run_cycle().await {
            Ok(summary) => {
                info!(
                    cycle = %summary.cycle_id,
                    chain = ?summary.chain,
                    budget = format!("{}/{}", summary.budget_spent, summary.budget_limit),
                    adapters = summary.assessments.len(),
                    anomalies = summary.anomalies.len(),
                    highest = ?summary.highest_severity,
                    "scan cycle complete"
                );
                react_to_transitions(&summary, responders).await;
                if once {
                    return Ok(());
                }
            }
            Err(e) => {
                error!("Scan cycle failed: {}", e);
                if once {
                    return Err(e);
                }
            }
        }
    }
}

/// Feed threat-level transitions observed this cycle into the shield
/// dispatcher (WARNING/CRITICAL) and the rebalancer (sub-critical; it
/// skips CRITICAL itself).
async fn react_to_transitions(summary: &CycleSummary, responders: &HashMap<Chain, Responder>) {
    let Some(chain) = summary.chain else {
        return;
    };
    let Some(responder) = responders.get(&chain) else {
        return;
    };

    for (name, assessment) in &summary.assessments {
        if !assessment.crossed_level() {
            continue;
        }
        let Some(&address) = responder.adapter_addresses.get(name) else {
            continue;
        };

        let event = ThreatChangeEvent {
            protocol: address,
            old_score: assessment.previous_score.unwrap_or(0),
            new_score: assessment.score,
            level: assessment.level,
        };

        info!(
            adapter = %name,
            level = event.level.label(),
            old_score = event.old_score,
            new_score = event.new_score,
            "threat level transition"
        );

        if event.level >= ThreatLevel::Warning {
            let outcome = responder.shield.dispatch(&event).await;
            info!(
                adapter = %name,
                action = ?outcome.action,
                success = outcome.success,
                message = %outcome.message,
                "shield outcome"
            );
        }

        let rebalance = responder.rebalancer.run(&event).await;
        info!(
            adapter = %name,
            rebalanced = rebalance.rebalanced,
            message = %rebalance.message,
            "rebalance outcome"
        );
    }
}

/// Set up graceful shutdown signal handling
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
