//! Composite risk scoring
//!
//! A deterministic weighted sum over on-chain and off-chain sub-signals.
//! Weight budget (100 conceptual points; any subset can fire):
//!
//! - health flag:          25  adapter reports unhealthy
//! - APY anomaly:          10  APY is zero (7 for suspiciously high)
//! - balance drain:        10  principal exists but balance is gone
//! - TVL velocity:         15  historical TVL drop brackets
//! - security flags:       15  honeypot dominant, else stacking flags
//! - code staleness:       10  days since last push brackets
//! - open source:           5  code cannot be verified
//! - admin outflow:         5  recent large admin-wallet outflows
//! - reserve:               5  headroom for future signals
//!
//! The function is pure: no hidden state, no randomness, no I/O.

use std::collections::BTreeMap;

use ethers::types::U256;

use vigil_chainio::{AdapterSnapshot, ProtocolRiskSnapshot, ThreatLevel};

use crate::types::{OffchainSignals, RiskAssessment};

/// APY above this many basis points is treated as suspicious (50% annualized)
pub const HIGH_APY_THRESHOLD_BPS: u64 = 5_000;

/// Compute the composite risk score for one adapter, clamped to [0, 100]
pub fn score(adapter: &AdapterSnapshot, offchain: &OffchainSignals) -> u8 {
    let mut score: u32 = 0;

    // --- On-chain signals ---

    if !adapter.is_healthy {
        score += 25;
    }

    // Zero APY and suspiciously high APY are mutually exclusive
    if adapter.apy_bps.is_zero() {
        score += 10;
    } else if adapter.apy_bps > U256::from(HIGH_APY_THRESHOLD_BPS) {
        score += 7;
    }

    if adapter.is_drained() {
        score += 10;
    }

    // --- Off-chain signals ---

    // TVL velocity: strictly the most negative bracket that applies
    let tvl_change = offchain.tvl.change_percent;
    if tvl_change < -20.0 {
        score += 15;
    } else if tvl_change < -10.0 {
        score += 10;
    } else if tvl_change < -5.0 {
        score += 5;
    }

    // Security scanner: honeypot dominates, otherwise flags stack
    let security = &offchain.security;
    if security.is_honeypot {
        score += 15;
    } else {
        if security.owner_can_change_balance {
            score += 8;
        }
        if security.is_proxy && !security.is_open_source {
            score += 5;
        }
        if security.is_mintable {
            score += 4;
        }
    }

    // Code staleness: most severe bracket only
    let days = offchain.github.last_push_days_ago;
    if days > 60 {
        score += 10;
    } else if days > 30 {
        score += 7;
    } else if days > 14 {
        score += 4;
    }

    if !security.is_open_source {
        score += 5;
    }

    if offchain.admin_wallet.recent_large_outflows {
        score += 5;
    }

    score.min(100) as u8
}

/// Threat classification of a composite score
pub fn classify(score: u8) -> ThreatLevel {
    ThreatLevel::from_score(score)
}

/// Score every adapter against the shared off-chain bundle.
///
/// Priors are matched by address; an adapter with no matching registry
/// record simply has no previous score — never an error.
pub fn score_all(
    adapters: &[AdapterSnapshot],
    priors: &[ProtocolRiskSnapshot],
    offchain: &OffchainSignals,
) -> BTreeMap<String, RiskAssessment> {
    adapters
        .iter()
        .map(|adapter| {
            let previous_score = priors
                .iter()
                .find(|r| r.address == adapter.address)
                .map(|r| r.risk_score);

            let score = score(adapter, offchain);
            (
                adapter.name.clone(),
                RiskAssessment {
                    score,
                    level: classify(score),
                    previous_score,
                },
            )
        })
        .collect()
}
