//! Budgeted scan orchestrator
//!
//! One cycle: read adapter snapshots chain by chain under the call
//! budget, read one shared reference price, fetch the off-chain bundle
//! once, score and detect over the primary chain, and issue at most one
//! batched registry write. Partial data is acceptable everywhere; the
//! only hard failure is a broken configuration.

use std::sync::Arc;

use chrono::Utc;
use ethers::types::{Address, U256};
use tracing::{info, warn};
use uuid::Uuid;

use vigil_chainio::{
    AdapterSnapshot, CallBudget, ChainReader, ChainWriter, PriceReading, ProtocolRiskSnapshot,
    RiskScoreUpdate, ADAPTER_READ_COST, PRICE_READ_COST, REGISTRY_READ_COST,
};

use crate::config::{ChainTargets, ScanConfig};
use crate::detector;
use crate::error::Result;
use crate::scorer;
use crate::signals::SignalFetcher;
use crate::types::{CycleSummary, PriceSignal, RiskAssessment};

/// One configured chain with its I/O capabilities attached
pub struct ChainContext {
    pub targets: ChainTargets,
    pub reader: Arc<dyn ChainReader>,
    pub writer: Arc<dyn ChainWriter>,
}

pub struct ScanOrchestrator {
    chains: Vec<ChainContext>,
    signals: SignalFetcher,
    scan: ScanConfig,
}

/// Adapter data read from one chain, before scoring
struct ChainReadout {
    index: usize,
    snapshots: Vec<AdapterSnapshot>,
}

impl ScanOrchestrator {
    pub fn new(chains: Vec<ChainContext>, signals: SignalFetcher, scan: ScanConfig) -> Self {
        Self {
            chains,
            signals,
            scan,
        }
    }

    /// Execute one full scan cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut budget = CallBudget::new(self.scan.read_budget);
        let mut skipped_chains = Vec::new();
        let mut price: Option<PriceReading> = None;
        let mut readouts: Vec<ChainReadout> = Vec::new();

        info!(%cycle_id, budget = budget.limit(), "scan cycle started");

        for (index, ctx) in self.chains.iter().enumerate() {
            let chain = ctx.targets.chain;
            let chain_cost = ctx.targets.adapters.len() as u32 * ADAPTER_READ_COST;

            // All-or-nothing per chain: a partial adapter set would skew
            // the portfolio-level signals
            if chain_cost == 0 || !budget.can_afford(chain_cost) {
                warn!(
                    %chain,
                    needed = chain_cost,
                    remaining = budget.remaining(),
                    "budget cannot cover this chain's adapter reads, skipping"
                );
                skipped_chains.push(chain);
            } else {
                let mut snapshots = Vec::with_capacity(ctx.targets.adapters.len());
                for target in &ctx.targets.adapters {
                    if !budget.try_charge(ADAPTER_READ_COST, &target.name) {
                        break; // unreachable given the can_afford gate
                    }
                    let address = target.address()?;
                    match ctx.reader.adapter_snapshot(&target.name, address).await {
                        Ok(snapshot) => snapshots.push(snapshot),
                        Err(e) => {
                            warn!(adapter = %target.name, error = %e, "adapter read failed")
                        }
                    }
                }
                if !snapshots.is_empty() {
                    readouts.push(ChainReadout { index, snapshots });
                }
            }

            // Shared price reference: first chain with a feed and budget
            if price.is_none() {
                if let Some(feed) = ctx.targets.price_feed_address()? {
                    if budget.try_charge(PRICE_READ_COST, "price_feed") {
                        match ctx.reader.price_feed(feed).await {
                            Ok(reading) => price = Some(reading),
                            Err(e) => warn!(%chain, error = %e, "price feed read failed"),
                        }
                    }
                }
            }
        }

        // Degenerate-but-valid: nothing to score this cycle
        let Some(primary) = readouts.first() else {
            warn!(%cycle_id, "no chain yielded adapter data, ending cycle early");
            return Ok(CycleSummary::empty(
                budget.spent(),
                budget.limit(),
                skipped_chains,
            ));
        };
        let ctx = &self.chains[primary.index];
        let chain = ctx.targets.chain;
        info!(%chain, adapters = primary.snapshots.len(), "primary chain selected");

        // Portfolio TVL from on-chain balances at the reference price
        let reference_usd = price.map(|p| p.price).unwrap_or(1.0);
        let decimals = ctx.targets.asset_decimals;
        let total_balance: f64 = primary
            .snapshots
            .iter()
            .map(|s| to_asset_units(s.balance, decimals))
            .sum();
        let total_principal: f64 = primary
            .snapshots
            .iter()
            .map(|s| to_asset_units(s.principal, decimals))
            .sum();
        let current_tvl = total_balance * reference_usd;

        let mut offchain = self.signals.fetch_all(&mut budget, current_tvl).await;

        match price {
            Some(reading) => {
                offchain.prices = PriceSignal {
                    reference_usd: reading.price,
                    updated_at: Some(reading.updated_at),
                };
            }
            None => offchain.defaulted.push("price".to_string()),
        }

        // The history endpoint owns the change percentage; without it,
        // fall back to comparing the portfolio balance against principal
        offchain.tvl.current_tvl = current_tvl;
        if offchain.defaulted.iter().any(|s| s == "tvl") && total_principal > 0.0 {
            offchain.tvl.change_percent =
                (total_balance - total_principal) / total_principal * 100.0;
        }

        let registry = ctx.targets.registry_address()?;
        let priors = self
            .read_priors(ctx, registry, &primary.snapshots, &mut budget)
            .await;

        let assessments = scorer::score_all(&primary.snapshots, &priors, &offchain);
        let anomalies = detector::detect_all(&primary.snapshots, &offchain);
        let highest_severity = detector::highest_severity(&anomalies);

        for (name, assessment) in &assessments {
            info!(
                adapter = %name,
                score = assessment.score,
                level = assessment.level.label(),
                "adapter assessed"
            );
        }

        // At most one write per cycle, and only once the decision is
        // complete: WARNING/CRITICAL anywhere pushes the whole batch
        let registry_write = if assessments.values().any(|a| a.level.is_actionable()) {
            let updates = build_updates(&primary.snapshots, &assessments, &anomalies);
            info!(updates = updates.len(), "actionable threat found, writing risk scores");
            Some(ctx.writer.update_risk_scores(registry, &updates).await)
        } else {
            None
        };

        Ok(CycleSummary {
            cycle_id,
            started_at,
            chain: Some(chain),
            budget_spent: budget.spent(),
            budget_limit: budget.limit(),
            assessments,
            anomalies,
            highest_severity,
            skipped_chains,
            defaulted_signals: offchain.defaulted,
            registry_write,
        })
    }

    /// Opportunistic prior reads: each costs one unit, and an exhausted
    /// budget or failed read simply leaves that adapter without a prior.
    async fn read_priors(
        &self,
        ctx: &ChainContext,
        registry: Address,
        snapshots: &[AdapterSnapshot],
        budget: &mut CallBudget,
    ) -> Vec<ProtocolRiskSnapshot> {
        let mut priors = Vec::new();
        for snapshot in snapshots {
            if !budget.try_charge(REGISTRY_READ_COST, "registry_prior") {
                break;
            }
            match ctx.reader.protocol_risk(registry, snapshot.address).await {
                Ok(prior) => priors.push(prior),
                Err(e) => {
                    warn!(adapter = %snapshot.name, error = %e, "prior risk read failed")
                }
            }
        }
        priors
    }
}

/// One update per scored adapter, with anomaly findings as the reason
fn build_updates(
    snapshots: &[AdapterSnapshot],
    assessments: &std::collections::BTreeMap<String, RiskAssessment>,
    anomalies: &[crate::types::Anomaly],
) -> Vec<RiskScoreUpdate> {
    snapshots
        .iter()
        .filter_map(|snapshot| {
            let assessment = assessments.get(&snapshot.name)?;
            let findings: Vec<String> = anomalies
                .iter()
                .filter(|a| a.adapter == snapshot.name)
                .map(|a| format!("{}: {}", a.kind, a.message))
                .collect();
            let reason = if findings.is_empty() {
                format!(
                    "Risk score: {}, Level: {}",
                    assessment.score,
                    assessment.level.label()
                )
            } else {
                findings.join("; ")
            };
            Some(RiskScoreUpdate {
                protocol: snapshot.address,
                new_score: assessment.score,
                reason,
            })
        })
        .collect()
}

/// Convert a raw token amount to whole asset units
fn to_asset_units(amount: U256, decimals: u32) -> f64 {
    // String round-trip avoids overflow for amounts beyond u128
    let raw: f64 = amount.to_string().parse().unwrap_or(f64::MAX);
    raw / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_units_scale_by_decimals() {
        assert_eq!(to_asset_units(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(to_asset_units(U256::zero(), 18), 0.0);
    }
}
