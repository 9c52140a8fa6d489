//! # Vigil ChainIO
//!
//! The boundary layer of Vigil — everything that touches the outside
//! world lives here: on-chain reads and writes over JSON-RPC, off-chain
//! HTTP fetches, and the per-cycle call budget that bounds both. The
//! sentinel crate consumes these capabilities through the traits in
//! [`reader`], [`writer`], and [`fetcher`] so the decision core stays
//! pure and testable.

pub mod budget;
pub mod contracts;
pub mod error;
pub mod fetcher;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use budget::{
    CallBudget, ADAPTER_READ_COST, HTTP_FETCH_COST, PRICE_READ_COST, REGISTRY_READ_COST,
};
pub use error::{ChainIoError, Result};
pub use fetcher::{HttpFetcher, OffchainFetcher};
pub use reader::{ChainReader, EvmReader, PriceReading};
pub use types::*;
pub use writer::{ChainWriter, DryRunWriter, EvmWriter};

/// Current version of the chainio layer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Chain {
    #[serde(rename = "ethereum")]
    Ethereum,
    #[serde(rename = "arbitrum")]
    Arbitrum,
    #[serde(rename = "optimism")]
    Optimism,
    #[serde(rename = "base")]
    Base,
}

impl Chain {
    /// Get the chain ID for this network
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Arbitrum => 42161,
            Chain::Optimism => 10,
            Chain::Base => 8453,
        }
    }

    /// Get the human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Chain {
    type Err = ChainIoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "arbitrum" | "arb" => Ok(Chain::Arbitrum),
            "optimism" | "op" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            _ => Err(ChainIoError::InvalidChain(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_roundtrip() {
        for chain in [Chain::Ethereum, Chain::Arbitrum, Chain::Optimism, Chain::Base] {
            let parsed: Chain = chain.name().parse().unwrap();
            assert_eq!(parsed, chain);
        }
        assert!("solana".parse::<Chain>().is_err());
    }
}
