//! Rebalance driver
//!
//! Runs when a threat-level change below CRITICAL lands: re-reads vault
//! and registry state, plans fresh allocations, and pushes weight
//! updates plus a rebalance trigger when the plan diverges far enough
//! from the current weights. CRITICAL changes are not handled here; the
//! shield dispatcher owns those.

use std::sync::Arc;

use ethers::types::{Address, U256};
use futures::future::join_all;
use tracing::{info, warn};

use vigil_chainio::{ChainReader, ChainWriter, ThreatChangeEvent, ThreatLevel};

use crate::allocator;
use crate::config::ShieldConfig;
use crate::types::{AdapterRiskInfo, RebalanceOutcome};

pub struct Rebalancer {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    config: ShieldConfig,
    vault: Address,
    registry: Address,
    adapters: Vec<Address>,
}

impl Rebalancer {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        config: ShieldConfig,
        vault: Address,
        registry: Address,
        adapters: Vec<Address>,
    ) -> Self {
        Self {
            reader,
            writer,
            config,
            vault,
            registry,
            adapters,
        }
    }

    /// React to one threat-level change.
    pub async fn run(&self, event: &ThreatChangeEvent) -> RebalanceOutcome {
        if event.level >= ThreatLevel::Critical {
            info!(
                adapter = %event.protocol,
                "threat is CRITICAL, rebalance skipped (shield path owns it)"
            );
            return RebalanceOutcome {
                rebalanced: false,
                allocations: Vec::new(),
                message: "critical threat handled by shield".to_string(),
            };
        }

        let pools = match self.reader.pool_allocations(self.vault).await {
            Ok(pools) => pools,
            Err(e) => {
                warn!(error = %e, "failed to read pool allocations, rebalance aborted");
                return RebalanceOutcome {
                    rebalanced: false,
                    allocations: Vec::new(),
                    message: format!("pool allocation read failed: {e}"),
                };
            }
        };

        // Per-adapter registry reads run concurrently; a failed read
        // drops that adapter from the plan input (the planner treats it
        // as "no opinion")
        let reads = self
            .adapters
            .iter()
            .map(|&adapter| self.reader.protocol_risk(self.registry, adapter));
        let mut risk_info = Vec::with_capacity(self.adapters.len());
        for (adapter, result) in self.adapters.iter().zip(join_all(reads).await) {
            match result {
                Ok(snapshot) => risk_info.push(AdapterRiskInfo {
                    address: snapshot.address,
                    risk_score: snapshot.risk_score,
                    threat_level: snapshot.threat_level,
                    // Extra APY reads are deliberately skipped here; zero
                    // keeps the plan purely risk-driven
                    apy_bps: U256::zero(),
                }),
                Err(e) => {
                    warn!(adapter = %adapter, error = %e, "risk record read failed, skipping");
                }
            }
        }

        let planned = allocator::plan(&pools, &risk_info, &self.config);

        if !allocator::should_rebalance(&pools, &planned, self.config.rebalance_threshold_bps) {
            info!("planned allocations within threshold, no rebalance");
            return RebalanceOutcome {
                rebalanced: false,
                allocations: planned,
                message: "allocations within threshold".to_string(),
            };
        }

        info!(pools = planned.len(), "allocation drift exceeds threshold, rebalancing");

        let mut failures = 0usize;
        for alloc in &planned {
            let outcome = self
                .writer
                .update_pool_weight(self.vault, alloc.adapter, alloc.new_weight_bps)
                .await;
            if !outcome.success {
                failures += 1;
                warn!(
                    adapter = %alloc.adapter,
                    weight_bps = alloc.new_weight_bps,
                    message = %outcome.message,
                    "pool weight update failed"
                );
            }
        }

        let trigger = self.writer.trigger_rebalance(self.vault).await;
        if !trigger.success {
            warn!(message = %trigger.message, "rebalance trigger failed");
        }

        let message = if failures == 0 && trigger.success {
            "rebalance executed".to_string()
        } else {
            format!(
                "rebalance attempted with {failures} weight-update failure(s), trigger success: {}",
                trigger.success
            )
        };

        RebalanceOutcome {
            rebalanced: trigger.success,
            allocations: planned,
            message,
        }
    }
}
