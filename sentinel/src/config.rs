//! Configuration management for the sentinel
//!
//! Loaded once at process start and treated as read-only for the
//! lifetime of every cycle.

use std::collections::HashMap;
use std::path::Path;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use url::Url;

use vigil_chainio::Chain;

use crate::error::{Result, SentinelError};

/// Top-level sentinel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentinelConfig {
    /// Chains to scan, in priority order
    pub chains: Vec<ChainTargets>,

    /// Off-chain signal sources
    pub offchain: OffchainConfig,

    /// Shield tunables
    pub shield: ShieldConfig,

    /// Scan cycle settings
    pub scan: ScanConfig,
}

/// One chain's monitored contracts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainTargets {
    pub chain: Chain,
    pub rpc_url: String,
    pub risk_registry: String,
    pub vault: String,
    /// Reference price feed for TVL valuation; omitted chains fall back
    /// to pricing at par
    pub price_feed: Option<String>,
    /// Decimals of the vault's accounting asset
    pub asset_decimals: u32,
    pub adapters: Vec<AdapterTarget>,
}

/// One monitored adapter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdapterTarget {
    pub name: String,
    pub address: String,
}

/// Off-chain API configuration with per-protocol endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OffchainConfig {
    /// Which protocol's endpoints represent the portfolio for off-chain
    /// fetching (one fetch set per cycle)
    pub primary_protocol: String,
    pub protocols: HashMap<String, ProtocolEndpoints>,
    /// Per-request timeout for off-chain fetches
    pub timeout_secs: u64,
}

/// Off-chain endpoints for one protocol. Every field is optional;
/// missing endpoints simply default their signal.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProtocolEndpoints {
    pub tvl_history_url: Option<String>,
    pub github_repo_url: Option<String>,
    pub security_scan_url: Option<String>,
    pub admin_wallet_url: Option<String>,
    /// The admin wallet address, used to attribute outgoing transfers
    pub admin_wallet: Option<String>,
    pub lending_metrics_url: Option<String>,
}

/// Shield tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShieldConfig {
    /// Percentage withdrawn on WARNING, in basis points (3000 = 30%)
    pub warning_withdraw_bps: u32,
    /// Adapter that receives funds withdrawn under protective action
    pub safe_haven_adapter: String,
    /// Max allocation to any single adapter, in basis points
    pub max_single_allocation_bps: u32,
    /// Minimum single-pool weight delta that justifies a rebalance
    pub rebalance_threshold_bps: u32,
}

/// Scan cycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// How often to run a scan cycle (seconds)
    pub interval_secs: u64,
    /// External-read budget per cycle, in units
    pub read_budget: u32,
    /// Environment variable holding the signer's private key
    pub signer_key_env: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            chains: vec![ChainTargets {
                chain: Chain::Arbitrum,
                rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
                risk_registry: "0x0000000000000000000000000000000000000000".to_string(),
                vault: "0x0000000000000000000000000000000000000000".to_string(),
                price_feed: None,
                asset_decimals: 6,
                adapters: Vec::new(),
            }],
            offchain: OffchainConfig {
                primary_protocol: "aave".to_string(),
                protocols: Self::default_protocols(),
                timeout_secs: 8,
            },
            shield: ShieldConfig {
                warning_withdraw_bps: 3_000,
                safe_haven_adapter: "SafeHavenAdapter".to_string(),
                max_single_allocation_bps: 5_000,
                rebalance_threshold_bps: 500,
            },
            scan: ScanConfig {
                interval_secs: 300,
                read_budget: 15,
                signer_key_env: "VIGIL_SIGNER_KEY".to_string(),
            },
        }
    }
}

impl SentinelConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| SentinelError::Config(config::ConfigError::Foreign(Box::new(e))))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the path in `SENTINEL_CONFIG_PATH`, falling back to
    /// defaults
    pub fn from_env_or_default() -> Result<Self> {
        if let Ok(config_path) = std::env::var("SENTINEL_CONFIG_PATH") {
            tracing::info!("Loading sentinel config from: {}", config_path);
            return Self::from_file(config_path);
        }

        tracing::info!("Using default sentinel configuration");
        Ok(Self::default())
    }

    /// Write the configuration as YAML (used by `--generate-config`)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| SentinelError::Config(config::ConfigError::Foreign(Box::new(e))))?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Endpoints of the configured primary protocol
    pub fn primary_endpoints(&self) -> Option<&ProtocolEndpoints> {
        self.offchain.protocols.get(&self.offchain.primary_protocol)
    }

    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(SentinelError::internal("no chains configured"));
        }
        if self.scan.read_budget == 0 {
            return Err(SentinelError::internal("read budget must be positive"));
        }
        if self.shield.warning_withdraw_bps > 10_000
            || self.shield.max_single_allocation_bps > 10_000
        {
            return Err(SentinelError::internal(
                "basis-point tunables cannot exceed 10000",
            ));
        }
        if !self
            .offchain
            .protocols
            .contains_key(&self.offchain.primary_protocol)
        {
            return Err(SentinelError::internal(format!(
                "primary protocol '{}' has no endpoint config",
                self.offchain.primary_protocol
            )));
        }
        for chain in &self.chains {
            if Url::parse(&chain.rpc_url).is_err() {
                return Err(SentinelError::internal(format!(
                    "invalid RPC URL for chain {}: {}",
                    chain.chain, chain.rpc_url
                )));
            }
        }
        for (protocol, endpoints) in &self.offchain.protocols {
            let urls = [
                &endpoints.tvl_history_url,
                &endpoints.github_repo_url,
                &endpoints.security_scan_url,
                &endpoints.admin_wallet_url,
                &endpoints.lending_metrics_url,
            ];
            for url in urls.into_iter().flatten() {
                if Url::parse(url).is_err() {
                    return Err(SentinelError::internal(format!(
                        "invalid endpoint URL for protocol {protocol}: {url}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn default_protocols() -> HashMap<String, ProtocolEndpoints> {
        let mut protocols = HashMap::new();
        protocols.insert(
            "aave".to_string(),
            ProtocolEndpoints {
                tvl_history_url: None,
                github_repo_url: Some("https://api.github.com/repos/aave/aave-v3-core".to_string()),
                security_scan_url: None,
                admin_wallet_url: None,
                admin_wallet: None,
                lending_metrics_url: None,
            },
        );
        protocols
    }
}

impl ChainTargets {
    pub fn registry_address(&self) -> Result<Address> {
        parse_address(&self.risk_registry)
    }

    pub fn vault_address(&self) -> Result<Address> {
        parse_address(&self.vault)
    }

    pub fn price_feed_address(&self) -> Result<Option<Address>> {
        self.price_feed.as_deref().map(parse_address).transpose()
    }
}

impl AdapterTarget {
    pub fn address(&self) -> Result<Address> {
        parse_address(&self.address)
    }
}

/// Parse a checksummed or lowercase hex address from config
pub fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|_| SentinelError::internal(format!("invalid address in config: {raw}")))
}
