//! Anomaly detection
//!
//! Each rule is an independent boolean test over one adapter's snapshot
//! and the shared off-chain bundle; multiple findings may fire for the
//! same adapter and are never merged.

use vigil_chainio::AdapterSnapshot;

use crate::scorer::HIGH_APY_THRESHOLD_BPS;
use crate::types::{Anomaly, AnomalyKind, OffchainSignals, Severity};

use ethers::types::U256;

/// Detect anomalies for a single adapter
pub fn detect(adapter: &AdapterSnapshot, offchain: &OffchainSignals) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    // TVL drop brackets: the worse bracket wins, never both
    let tvl_change = offchain.tvl.change_percent;
    if tvl_change < -20.0 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::BankRun,
            severity: Severity::Critical,
            adapter: adapter.name.clone(),
            message: format!("TVL dropped {tvl_change:.1}%, possible bank run"),
        });
    } else if tvl_change < -10.0 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::TvlDrop,
            severity: Severity::Warning,
            adapter: adapter.name.clone(),
            message: format!("TVL dropped {tvl_change:.1}%, significant outflow"),
        });
    }

    if offchain.security.is_honeypot {
        anomalies.push(Anomaly {
            kind: AnomalyKind::Honeypot,
            severity: Severity::Critical,
            adapter: adapter.name.clone(),
            message: "security scanner flagged token as honeypot".to_string(),
        });
    }

    // Team exit requires BOTH staleness and outflows; neither alone fires
    if offchain.github.last_push_days_ago > 30 && offchain.admin_wallet.recent_large_outflows {
        anomalies.push(Anomaly {
            kind: AnomalyKind::TeamExit,
            severity: Severity::Critical,
            adapter: adapter.name.clone(),
            message: format!(
                "no code activity for {}d and large admin outflows detected",
                offchain.github.last_push_days_ago
            ),
        });
    }

    if adapter.is_drained() {
        anomalies.push(Anomaly {
            kind: AnomalyKind::BalanceDrain,
            severity: Severity::Critical,
            adapter: adapter.name.clone(),
            message: "balance is 0 but principal exists, possible exploit".to_string(),
        });
    }

    if adapter.apy_bps > U256::from(HIGH_APY_THRESHOLD_BPS) {
        anomalies.push(Anomaly {
            kind: AnomalyKind::ApySpike,
            severity: Severity::Warning,
            adapter: adapter.name.clone(),
            message: format!("APY is {} bps, suspiciously high", adapter.apy_bps),
        });
    }

    // Utilization brackets fire only when the lending signal carries a
    // market matching this adapter; worse bracket wins
    if let Some(utilization) = offchain.lending.utilization_for(&adapter.name) {
        if utilization > 95.0 {
            anomalies.push(Anomaly {
                kind: AnomalyKind::LiquidityCrunch,
                severity: Severity::Critical,
                adapter: adapter.name.clone(),
                message: format!(
                    "protocol utilization at {utilization:.1}%, liquidity crunch imminent"
                ),
            });
        } else if utilization > 85.0 {
            anomalies.push(Anomaly {
                kind: AnomalyKind::HighUtilization,
                severity: Severity::Warning,
                adapter: adapter.name.clone(),
                message: format!(
                    "protocol utilization at {utilization:.1}%, withdrawals may be delayed"
                ),
            });
        }
    }

    anomalies
}

/// Detect anomalies for every adapter and return a flat list
pub fn detect_all(adapters: &[AdapterSnapshot], offchain: &OffchainSignals) -> Vec<Anomaly> {
    adapters
        .iter()
        .flat_map(|adapter| detect(adapter, offchain))
        .collect()
}

/// The single highest-ranked severity present, or None for no findings
pub fn highest_severity(anomalies: &[Anomaly]) -> Option<Severity> {
    anomalies.iter().map(|a| a.severity).max()
}
