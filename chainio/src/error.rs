//! Error types for the chainio layer

use thiserror::Error;

/// Result type alias for chainio operations
pub type Result<T> = std::result::Result<T, ChainIoError>;

/// Error types for on-chain and off-chain I/O
#[derive(Error, Debug)]
pub enum ChainIoError {
    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Ethereum client error: {0}")]
    Ethereum(#[from] ethers::providers::ProviderError),

    #[error("Contract call error: {message}")]
    ContractCall { message: String },

    #[error("ABI decode error: {message}")]
    AbiDecode { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("Read budget exhausted: needed {needed} units, {remaining} remaining")]
    BudgetExhausted { needed: u32, remaining: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainIoError {
    /// Create a contract call error
    pub fn contract_call<S: Into<String>>(message: S) -> Self {
        Self::ContractCall {
            message: message.into(),
        }
    }

    /// Create an ABI decode error
    pub fn abi_decode<S: Into<String>>(message: S) -> Self {
        Self::AbiDecode {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}
