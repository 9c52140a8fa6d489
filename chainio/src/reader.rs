//! On-chain read capability
//!
//! All reads are pinned at the last finalized block so every snapshot in
//! a cycle describes the same consistent chain state.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, BlockId, BlockNumber, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contracts::{AggregatorV3, RiskRegistry, ShieldVault, YieldAdapter};
use crate::error::{ChainIoError, Result};
use crate::types::{AdapterSnapshot, PoolAllocation, ProtocolRiskSnapshot, ThreatLevel};

/// One reference price read from a Chainlink-style aggregator
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceReading {
    pub price: f64,
    /// Unix seconds of the aggregator's last update
    pub updated_at: u64,
}

/// Read access to adapter, vault, and registry state
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Read one adapter's snapshot (costs three contract calls)
    async fn adapter_snapshot(&self, name: &str, adapter: Address) -> Result<AdapterSnapshot>;

    /// Read a reference price feed
    async fn price_feed(&self, feed: Address) -> Result<PriceReading>;

    /// Read the vault's current pool allocations
    async fn pool_allocations(&self, vault: Address) -> Result<Vec<PoolAllocation>>;

    /// Read one protocol's registry risk record
    async fn protocol_risk(
        &self,
        registry: Address,
        protocol: Address,
    ) -> Result<ProtocolRiskSnapshot>;
}

/// JSON-RPC backed reader
pub struct EvmReader {
    provider: Arc<Provider<Http>>,
}

impl EvmReader {
    /// Connect to an HTTP RPC endpoint
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        Ok(Self {
            provider: Arc::new(provider),
        })
    }

    fn finalized() -> BlockId {
        BlockId::Number(BlockNumber::Finalized)
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    async fn adapter_snapshot(&self, name: &str, adapter: Address) -> Result<AdapterSnapshot> {
        let contract = YieldAdapter::new(adapter, self.provider.clone());

        // All three calls are pinned at the same finalized block, so
        // they can be issued concurrently
        let (apy_bps, is_healthy, (principal, accrued_yield, balance)) = futures::try_join!(
            async {
                contract
                    .get_current_apy()
                    .block(Self::finalized())
                    .call()
                    .await
                    .map_err(|e| ChainIoError::contract_call(format!("getCurrentAPY: {e}")))
            },
            async {
                contract
                    .is_healthy()
                    .block(Self::finalized())
                    .call()
                    .await
                    .map_err(|e| ChainIoError::contract_call(format!("isHealthy: {e}")))
            },
            async {
                contract
                    .get_balance_breakdown()
                    .block(Self::finalized())
                    .call()
                    .await
                    .map_err(|e| ChainIoError::contract_call(format!("getBalanceBreakdown: {e}")))
            },
        )?;

        debug!(
            adapter = name,
            %balance,
            apy_bps = %apy_bps,
            is_healthy,
            "adapter snapshot read"
        );

        Ok(AdapterSnapshot {
            name: name.to_string(),
            address: adapter,
            balance,
            principal,
            accrued_yield,
            apy_bps,
            is_healthy,
        })
    }

    async fn price_feed(&self, feed: Address) -> Result<PriceReading> {
        let contract = AggregatorV3::new(feed, self.provider.clone());

        let (_round_id, answer, _started_at, updated_at, _answered_in) = contract
            .latest_round_data()
            .block(Self::finalized())
            .call()
            .await
            .map_err(|e| ChainIoError::contract_call(format!("latestRoundData: {e}")))?;

        if answer.is_negative() || answer.is_zero() {
            return Err(ChainIoError::abi_decode(format!(
                "non-positive price answer {answer} from feed {feed:?}"
            )));
        }

        // Chainlink USD feeds report 8 decimals
        let price = answer.as_i128() as f64 / 1e8;

        Ok(PriceReading {
            price,
            updated_at: updated_at.min(U256::from(u64::MAX)).as_u64(),
        })
    }

    async fn pool_allocations(&self, vault: Address) -> Result<Vec<PoolAllocation>> {
        let contract = ShieldVault::new(vault, self.provider.clone());

        let raw = contract
            .get_pool_allocations()
            .block(Self::finalized())
            .call()
            .await
            .map_err(|e| ChainIoError::contract_call(format!("getPoolAllocations: {e}")))?;

        Ok(raw
            .into_iter()
            .map(
                |(adapter, tier, target_weight, current_amount, is_active)| PoolAllocation {
                    adapter,
                    tier,
                    target_weight_bps: target_weight.min(U256::from(u32::MAX)).as_u32(),
                    current_amount,
                    is_active,
                },
            )
            .collect())
    }

    async fn protocol_risk(
        &self,
        registry: Address,
        protocol: Address,
    ) -> Result<ProtocolRiskSnapshot> {
        let contract = RiskRegistry::new(registry, self.provider.clone());

        let (risk_score, threat_level, last_updated, is_active) = contract
            .get_protocol_risk(protocol)
            .block(Self::finalized())
            .call()
            .await
            .map_err(|e| ChainIoError::contract_call(format!("getProtocolRisk: {e}")))?;

        let threat_level = ThreatLevel::from_u8(threat_level).ok_or_else(|| {
            ChainIoError::abi_decode(format!(
                "registry returned threat level {threat_level} for {protocol:?}"
            ))
        })?;

        Ok(ProtocolRiskSnapshot {
            address: protocol,
            risk_score,
            threat_level,
            last_updated,
            is_active,
        })
    }
}
