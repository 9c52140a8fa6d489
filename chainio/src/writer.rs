//! On-chain write capability
//!
//! Writes are fire-and-forget: every method reports success or failure
//! as a [`TxOutcome`] instead of returning an error, so a rejected
//! transaction can never abort a scan cycle.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::ContractCall;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use tracing::info;

use crate::contracts::{RiskRegistry, ShieldVault};
use crate::error::Result;
use crate::types::{RiskScoreUpdate, TxOutcome};

/// Write access to the risk registry and the shield vault
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Batched risk-score update — one write per cycle maximum
    async fn update_risk_scores(
        &self,
        registry: Address,
        updates: &[RiskScoreUpdate],
    ) -> TxOutcome;

    /// Set one pool's target weight
    async fn update_pool_weight(
        &self,
        vault: Address,
        adapter: Address,
        weight_bps: u32,
    ) -> TxOutcome;

    /// Ask the vault to rebalance to its current target weights
    async fn trigger_rebalance(&self, vault: Address) -> TxOutcome;

    /// Withdraw a percentage of one adapter's position
    async fn partial_withdraw(
        &self,
        vault: Address,
        adapter: Address,
        percentage_bps: u32,
        reason: &str,
    ) -> TxOutcome;

    /// Withdraw everything the vault holds in one adapter
    async fn emergency_withdraw(&self, vault: Address, adapter: Address, reason: &str)
        -> TxOutcome;
}

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// JSON-RPC backed writer signing with a local key
pub struct EvmWriter {
    client: Arc<Client>,
}

impl EvmWriter {
    /// Connect to an HTTP RPC endpoint with a signing key
    pub fn connect(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        let wallet = private_key
            .parse::<LocalWallet>()?
            .with_chain_id(chain_id);

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
        })
    }

    async fn submit<M: Middleware + 'static>(call: ContractCall<M, ()>, label: &str) -> TxOutcome {
        match call.send().await {
            Ok(pending) => match pending.await {
                Ok(Some(receipt)) => {
                    info!(label, tx = ?receipt.transaction_hash, "write confirmed");
                    TxOutcome::ok(format!("{label} confirmed"), Some(receipt.transaction_hash))
                }
                Ok(None) => TxOutcome::ok(format!("{label} submitted, receipt unavailable"), None),
                Err(e) => TxOutcome::failed(format!("{label} dropped: {e}")),
            },
            Err(e) => TxOutcome::failed(format!("{label} rejected: {e}")),
        }
    }
}

#[async_trait]
impl ChainWriter for EvmWriter {
    async fn update_risk_scores(
        &self,
        registry: Address,
        updates: &[RiskScoreUpdate],
    ) -> TxOutcome {
        if updates.is_empty() {
            return TxOutcome::failed("empty risk score batch");
        }

        let contract = RiskRegistry::new(registry, self.client.clone());
        let protocols: Vec<Address> = updates.iter().map(|u| u.protocol).collect();
        let scores: Vec<u8> = updates.iter().map(|u| u.new_score).collect();
        let reasons: Vec<String> = updates.iter().map(|u| u.reason.clone()).collect();

        let call = contract.batch_update_risk_scores(protocols, scores, reasons);
        Self::submit(call, "batchUpdateRiskScores").await
    }

    async fn update_pool_weight(
        &self,
        vault: Address,
        adapter: Address,
        weight_bps: u32,
    ) -> TxOutcome {
        let contract = ShieldVault::new(vault, self.client.clone());
        let call = contract.update_pool_weight(adapter, U256::from(weight_bps));
        Self::submit(call, "updatePoolWeight").await
    }

    async fn trigger_rebalance(&self, vault: Address) -> TxOutcome {
        let contract = ShieldVault::new(vault, self.client.clone());
        let call = contract.rebalance();
        Self::submit(call, "rebalance").await
    }

    async fn partial_withdraw(
        &self,
        vault: Address,
        adapter: Address,
        percentage_bps: u32,
        reason: &str,
    ) -> TxOutcome {
        let contract = ShieldVault::new(vault, self.client.clone());
        let call = contract.partial_withdraw(
            adapter,
            U256::from(percentage_bps),
            reason.to_string(),
        );
        Self::submit(call, "partialWithdraw").await
    }

    async fn emergency_withdraw(
        &self,
        vault: Address,
        adapter: Address,
        reason: &str,
    ) -> TxOutcome {
        let contract = ShieldVault::new(vault, self.client.clone());
        let call = contract.emergency_withdraw(adapter, reason.to_string());
        Self::submit(call, "emergencyWithdraw").await
    }
}

/// Writer that logs every intended transaction without submitting it.
/// Used in dry-run mode.
pub struct DryRunWriter;

#[async_trait]
impl ChainWriter for DryRunWriter {
    async fn update_risk_scores(
        &self,
        registry: Address,
        updates: &[RiskScoreUpdate],
    ) -> TxOutcome {
        info!(?registry, count = updates.len(), "dry-run: batchUpdateRiskScores");
        TxOutcome::ok("dry-run: risk scores not written", None)
    }

    async fn update_pool_weight(
        &self,
        vault: Address,
        adapter: Address,
        weight_bps: u32,
    ) -> TxOutcome {
        info!(?vault, ?adapter, weight_bps, "dry-run: updatePoolWeight");
        TxOutcome::ok("dry-run: pool weight not written", None)
    }

    async fn trigger_rebalance(&self, vault: Address) -> TxOutcome {
        info!(?vault, "dry-run: rebalance");
        TxOutcome::ok("dry-run: rebalance not triggered", None)
    }

    async fn partial_withdraw(
        &self,
        vault: Address,
        adapter: Address,
        percentage_bps: u32,
        reason: &str,
    ) -> TxOutcome {
        info!(?vault, ?adapter, percentage_bps, reason, "dry-run: partialWithdraw");
        TxOutcome::ok("dry-run: partial withdraw not submitted", None)
    }

    async fn emergency_withdraw(
        &self,
        vault: Address,
        adapter: Address,
        reason: &str,
    ) -> TxOutcome {
        info!(?vault, ?adapter, reason, "dry-run: emergencyWithdraw");
        TxOutcome::ok("dry-run: emergency withdraw not submitted", None)
    }
}
