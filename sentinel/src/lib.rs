//! Vigil Sentinel
//!
//! The decision layer of Vigil — scores lending adapters, detects
//! anomalies, plans capital allocations, and dispatches protective
//! withdrawals, all under a fixed per-cycle external-call budget.
//!
//! ## Inputs:
//! 1. **vigil_chainio**: On-chain adapter/vault/registry state and
//!    off-chain HTTP signals, metered by the call budget
//! 2. **config**: Chain targets, off-chain endpoints, shield tunables
//!
//! ## Outputs:
//! - Batched risk-score registry writes, pool weight updates, and
//!   partial/emergency withdrawals via the chainio writer

pub mod allocator;
pub mod config;
pub mod detector;
pub mod error;
pub mod rebalance;
pub mod scan;
pub mod scorer;
pub mod shield;
pub mod signals;
pub mod types;

pub use config::{
    AdapterTarget, ChainTargets, OffchainConfig, ProtocolEndpoints, ScanConfig, SentinelConfig,
    ShieldConfig,
};
pub use error::{Result, SentinelError};
pub use rebalance::Rebalancer;
pub use scan::{ChainContext, ScanOrchestrator};
pub use shield::ShieldDispatcher;
pub use signals::SignalFetcher;
pub use types::*;

/// Version of the sentinel layer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
