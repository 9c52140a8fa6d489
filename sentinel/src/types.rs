//! Core types for the sentinel decision layer
//!
//! On-chain snapshot shapes live in `vigil_chainio::types`; everything
//! here is derived per cycle and discarded when the cycle ends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_chainio::{Chain, ThreatLevel, TxOutcome};

// ---------------------------------------------------------------------
// Off-chain signals
// ---------------------------------------------------------------------

/// Reference asset price shared by all adapters scored in one cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceSignal {
    /// USD price of the vault's accounting asset
    pub reference_usd: f64,
    /// Unix seconds of the feed's last update, when known
    pub updated_at: Option<u64>,
}

impl PriceSignal {
    /// No-signal fallback: a stable-denominated vault prices at par
    pub fn default_signal() -> Self {
        Self {
            reference_usd: 1.0,
            updated_at: None,
        }
    }
}

/// Total value locked and its change against a historical snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TvlSignal {
    pub current_tvl: f64,
    /// Percent change versus the historical snapshot (negative = drop)
    pub change_percent: f64,
}

impl TvlSignal {
    pub fn default_signal() -> Self {
        Self {
            current_tvl: 0.0,
            change_percent: 0.0,
        }
    }
}

/// Code-activity indicators for the protocol's repository
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GithubSignal {
    pub recent_commits: u32,
    pub open_issues: u32,
    pub last_push_days_ago: u32,
}

impl GithubSignal {
    /// No-signal fallback treats the repository as fresh — an
    /// unreachable API must not score as abandonment.
    pub fn default_signal() -> Self {
        Self {
            recent_commits: 0,
            open_issues: 0,
            last_push_days_ago: 0,
        }
    }
}

/// Token security scanner flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SecuritySignal {
    pub is_honeypot: bool,
    pub is_open_source: bool,
    pub is_proxy: bool,
    pub owner_can_change_balance: bool,
    pub is_mintable: bool,
}

impl SecuritySignal {
    /// No-signal fallback: not flagged
    pub fn default_signal() -> Self {
        Self {
            is_honeypot: false,
            is_open_source: true,
            is_proxy: false,
            owner_can_change_balance: false,
            is_mintable: false,
        }
    }
}

/// Admin/team wallet indicators from a block explorer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdminWalletSignal {
    pub balance_eth: f64,
    pub recent_large_outflows: bool,
}

impl AdminWalletSignal {
    pub fn default_signal() -> Self {
        Self {
            balance_eth: 0.0,
            recent_large_outflows: false,
        }
    }
}

/// One lending market's utilization metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub utilization_pct: f64,
    pub supply_apy_pct: f64,
    pub borrow_apy_pct: f64,
}

/// Optional per-market lending metrics, keyed by protocol slug
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LendingSignal {
    pub markets: BTreeMap<String, MarketMetrics>,
}

impl LendingSignal {
    pub fn default_signal() -> Self {
        Self::default()
    }

    /// Find the utilization for an adapter by case-insensitive slug
    /// match against the adapter name (e.g. market "aave" matches
    /// adapter "AaveAdapter"). Adapters without a matching market have
    /// no utilization opinion.
    pub fn utilization_for(&self, adapter_name: &str) -> Option<f64> {
        let name = adapter_name.to_lowercase();
        self.markets
            .iter()
            .find(|(slug, _)| name.contains(&slug.to_lowercase()))
            .map(|(_, metrics)| metrics.utilization_pct)
    }
}

/// The full off-chain signal bundle, fetched once per cycle and shared
/// across every adapter scored in that cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffchainSignals {
    pub prices: PriceSignal,
    pub tvl: TvlSignal,
    pub github: GithubSignal,
    pub security: SecuritySignal,
    pub admin_wallet: AdminWalletSignal,
    pub lending: LendingSignal,
    /// Names of sources that fell back to their no-signal default
    pub defaulted: Vec<String>,
}

impl OffchainSignals {
    /// Every source at its conservative default
    pub fn all_defaulted() -> Self {
        Self {
            prices: PriceSignal::default_signal(),
            tvl: TvlSignal::default_signal(),
            github: GithubSignal::default_signal(),
            security: SecuritySignal::default_signal(),
            admin_wallet: AdminWalletSignal::default_signal(),
            lending: LendingSignal::default_signal(),
            defaulted: vec![
                "price".into(),
                "tvl".into(),
                "github".into(),
                "security".into(),
                "admin_wallet".into(),
                "lending".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------

/// Severity ranking for anomaly findings: WATCH < WARNING < CRITICAL
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Watch,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Watch => "WATCH",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

/// Enumerated anomaly categories
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    TvlDrop,
    BankRun,
    Honeypot,
    TeamExit,
    BalanceDrain,
    ApySpike,
    HighUtilization,
    LiquidityCrunch,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::TvlDrop => "TVL_DROP",
            AnomalyKind::BankRun => "BANK_RUN",
            AnomalyKind::Honeypot => "HONEYPOT",
            AnomalyKind::TeamExit => "TEAM_EXIT",
            AnomalyKind::BalanceDrain => "BALANCE_DRAIN",
            AnomalyKind::ApySpike => "APY_SPIKE",
            AnomalyKind::HighUtilization => "HIGH_UTILIZATION",
            AnomalyKind::LiquidityCrunch => "LIQUIDITY_CRUNCH",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One detector finding. Derived every cycle, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Name of the adapter this finding concerns
    pub adapter: String,
    pub message: String,
}

// ---------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------

/// One adapter's computed score and classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: ThreatLevel,
    /// Registry-side score before this cycle, when a prior record existed
    pub previous_score: Option<u8>,
}

impl RiskAssessment {
    /// Whether this cycle moved the adapter across a threat boundary
    pub fn crossed_level(&self) -> bool {
        match self.previous_score {
            Some(prev) => ThreatLevel::from_score(prev) != self.level,
            None => self.level != ThreatLevel::Safe,
        }
    }
}

// ---------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------

/// Risk context for one adapter entering allocation planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterRiskInfo {
    pub address: Address,
    pub risk_score: u8,
    pub threat_level: ThreatLevel,
    pub apy_bps: U256,
}

/// Proposed new weight for one adapter. Ephemeral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub adapter: Address,
    pub new_weight_bps: u32,
}

/// Outcome of one rebalance evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceOutcome {
    pub rebalanced: bool,
    pub allocations: Vec<AllocationResult>,
    pub message: String,
}

// ---------------------------------------------------------------------
// Shield
// ---------------------------------------------------------------------

/// Protective action selected for a threat-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldAction {
    None,
    PartialWithdraw,
    EmergencyWithdraw,
}

/// Structured record of one shield dispatch, for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldOutcome {
    pub action: ShieldAction,
    pub adapter: Address,
    pub reason: String,
    pub level: ThreatLevel,
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------
// Scan cycle
// ---------------------------------------------------------------------

/// Summary of one completed scan cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Primary chain scored this cycle; None in the degenerate
    /// no-adapter-data case
    pub chain: Option<Chain>,
    pub budget_spent: u32,
    pub budget_limit: u32,
    /// Per-adapter assessments keyed by adapter name
    pub assessments: BTreeMap<String, RiskAssessment>,
    pub anomalies: Vec<Anomaly>,
    pub highest_severity: Option<Severity>,
    /// Chains whose adapter reads were skipped for lack of budget
    pub skipped_chains: Vec<Chain>,
    /// Off-chain sources that fell back to defaults
    pub defaulted_signals: Vec<String>,
    /// The batched registry write, when one was issued
    pub registry_write: Option<TxOutcome>,
}

impl CycleSummary {
    /// Degenerate-but-valid outcome: no chain yielded adapter data
    pub fn empty(budget_spent: u32, budget_limit: u32, skipped_chains: Vec<Chain>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            chain: None,
            budget_spent,
            budget_limit,
            assessments: BTreeMap::new(),
            anomalies: Vec::new(),
            highest_severity: None,
            skipped_chains,
            defaulted_signals: Vec::new(),
            registry_write: None,
        }
    }

    /// Whether some adapter reached WARNING or CRITICAL this cycle
    pub fn has_actionable_threat(&self) -> bool {
        self.assessments.values().any(|a| a.level.is_actionable())
    }
}
