//! Core on-chain data shapes shared across the workspace
//!
//! These are the snapshots the sentinel scores and the records it writes
//! back. Snapshots are created once per scan cycle and never mutated.

use chrono::{DateTime, Utc};
use ethers::abi::{self, ParamType};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Ordinal threat classification written to and read from the risk registry.
///
/// The ordering is total: `Safe < Watch < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Safe,
    Watch,
    Warning,
    Critical,
}

impl ThreatLevel {
    /// Classify a composite risk score into a threat level.
    ///
    /// Total partition of [0, 100]: SAFE <= 25, WATCH 26-50,
    /// WARNING 51-75, CRITICAL >= 76.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=25 => ThreatLevel::Safe,
            26..=50 => ThreatLevel::Watch,
            51..=75 => ThreatLevel::Warning,
            _ => ThreatLevel::Critical,
        }
    }

    /// Decode the on-chain enum representation. Out-of-range values are
    /// rejected so callers choose their own fallback.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ThreatLevel::Safe),
            1 => Some(ThreatLevel::Watch),
            2 => Some(ThreatLevel::Warning),
            3 => Some(ThreatLevel::Critical),
            _ => None,
        }
    }

    /// The on-chain enum representation
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Human-readable label matching the registry contract's enum names
    pub fn label(&self) -> &'static str {
        match self {
            ThreatLevel::Safe => "SAFE",
            ThreatLevel::Watch => "WATCH",
            ThreatLevel::Warning => "WARNING",
            ThreatLevel::Critical => "CRITICAL",
        }
    }

    /// Whether this level warrants defensive action
    pub fn is_actionable(&self) -> bool {
        *self >= ThreatLevel::Warning
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One monitored adapter's on-chain state, read at a finalized block.
///
/// Under normal operation `balance = principal + accrued_yield`; a
/// balance that collapses to zero while principal remains is itself a
/// safety signal, not a read error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSnapshot {
    pub name: String,
    pub address: Address,
    pub balance: U256,
    pub principal: U256,
    pub accrued_yield: U256,
    /// Current APY in basis points
    pub apy_bps: U256,
    pub is_healthy: bool,
}

impl AdapterSnapshot {
    /// Principal is still recorded but the balance is gone — the
    /// balance-drain precondition shared by the scorer and detector.
    pub fn is_drained(&self) -> bool {
        self.principal > U256::zero() && self.balance.is_zero()
    }
}

/// Last known registry-side risk record for a protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRiskSnapshot {
    pub address: Address,
    pub risk_score: u8,
    pub threat_level: ThreatLevel,
    /// Unix seconds of the last registry update
    pub last_updated: U256,
    pub is_active: bool,
}

/// One adapter's membership in the vault's portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolAllocation {
    pub adapter: Address,
    /// Risk tier assigned by the vault (0 = LOW, 1 = MEDIUM, 2 = HIGH)
    pub tier: u8,
    /// Target weight in basis points (10_000 = 100%)
    pub target_weight_bps: u32,
    pub current_amount: U256,
    pub is_active: bool,
}

/// One entry of the batched registry write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScoreUpdate {
    pub protocol: Address,
    pub new_score: u8,
    pub reason: String,
}

/// Result of a fire-and-forget on-chain write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutcome {
    pub success: bool,
    pub message: String,
    pub tx_hash: Option<H256>,
    pub submitted_at: DateTime<Utc>,
}

impl TxOutcome {
    pub fn ok<S: Into<String>>(message: S, tx_hash: Option<H256>) -> Self {
        Self {
            success: true,
            message: message.into(),
            tx_hash,
            submitted_at: Utc::now(),
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            tx_hash: None,
            submitted_at: Utc::now(),
        }
    }
}

/// keccak256("RiskScoreUpdated(address,uint8,uint8,uint8)")
pub static RISK_SCORE_UPDATED_SIG: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256("RiskScoreUpdated(address,uint8,uint8,uint8)")));

/// Decoded `RiskScoreUpdated` event — the external trigger for the
/// rebalancer and the shield dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatChangeEvent {
    pub protocol: Address,
    pub old_score: u8,
    pub new_score: u8,
    pub level: ThreatLevel,
}

impl ThreatChangeEvent {
    /// Decode from a raw log. A payload that cannot be parsed falls back
    /// to a SAFE no-op event rather than guessing.
    pub fn decode(topics: &[H256], data: &[u8]) -> Self {
        match Self::try_decode(topics, data) {
            Some(event) => event,
            None => {
                tracing::warn!("malformed RiskScoreUpdated payload, defaulting to SAFE");
                Self::safe_default()
            }
        }
    }

    fn try_decode(topics: &[H256], data: &[u8]) -> Option<Self> {
        // topics[0] = event signature, topics[1] = indexed protocol address
        if topics.first() != Some(&*RISK_SCORE_UPDATED_SIG) {
            return None;
        }
        let protocol = topics.get(1).map(|t| Address::from_slice(&t.as_bytes()[12..]))?;

        let tokens = abi::decode(
            &[ParamType::Uint(8), ParamType::Uint(8), ParamType::Uint(8)],
            data,
        )
        .ok()?;

        let word = |i: usize| -> Option<u8> {
            let v = tokens.get(i)?.clone().into_uint()?;
            if v > U256::from(u8::MAX) {
                return None;
            }
            Some(v.as_u32() as u8)
        };

        let old_score = word(0)?;
        let new_score = word(1)?;
        let level = ThreatLevel::from_u8(word(2)?)?;

        Some(Self {
            protocol,
            old_score,
            new_score,
            level,
        })
    }

    /// The take-no-action fallback for undecodable payloads
    pub fn safe_default() -> Self {
        Self {
            protocol: Address::zero(),
            old_score: 0,
            new_score: 0,
            level: ThreatLevel::Safe,
        }
    }
}
