//! Full scan-cycle behavior: budget enforcement, chain skipping,
//! degenerate cycles, and the batched registry write

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde_json::{json, Value};

use vigil_chainio::{
    AdapterSnapshot, Chain, ChainIoError, ChainReader, ChainWriter, OffchainFetcher,
    PoolAllocation, PriceReading, ProtocolRiskSnapshot, Result as IoResult, RiskScoreUpdate,
    ThreatLevel, TxOutcome,
};
use vigil_sentinel::config::{AdapterTarget, ChainTargets, ProtocolEndpoints, ScanConfig};
use vigil_sentinel::{ChainContext, ScanOrchestrator, SignalFetcher};

// ---------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------

struct StubReader {
    snapshots: Vec<AdapterSnapshot>,
    price: Option<PriceReading>,
    priors: Vec<ProtocolRiskSnapshot>,
    adapter_calls: AtomicU32,
    price_calls: AtomicU32,
}

impl StubReader {
    fn new(snapshots: Vec<AdapterSnapshot>, price: Option<PriceReading>) -> Self {
        Self {
            snapshots,
            price,
            priors: Vec::new(),
            adapter_calls: AtomicU32::new(0),
            price_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ChainReader for StubReader {
    async fn adapter_snapshot(&self, name: &str, _adapter: Address) -> IoResult<AdapterSnapshot> {
        self.adapter_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| ChainIoError::contract_call(format!("no snapshot for {name}")))
    }

    async fn price_feed(&self, _feed: Address) -> IoResult<PriceReading> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.price
            .ok_or_else(|| ChainIoError::contract_call("feed unavailable"))
    }

    async fn pool_allocations(&self, _vault: Address) -> IoResult<Vec<PoolAllocation>> {
        Ok(Vec::new())
    }

    async fn protocol_risk(
        &self,
        _registry: Address,
        protocol: Address,
    ) -> IoResult<ProtocolRiskSnapshot> {
        self.priors
            .iter()
            .find(|p| p.address == protocol)
            .cloned()
            .ok_or_else(|| ChainIoError::contract_call("no registry record"))
    }
}

#[derive(Default)]
struct RecordingWriter {
    batches: Mutex<Vec<Vec<RiskScoreUpdate>>>,
}

#[async_trait]
impl ChainWriter for RecordingWriter {
    async fn update_risk_scores(
        &self,
        _registry: Address,
        updates: &[RiskScoreUpdate],
    ) -> TxOutcome {
        self.batches.lock().unwrap().push(updates.to_vec());
        TxOutcome::ok("batch recorded", None)
    }

    async fn update_pool_weight(
        &self,
        _vault: Address,
        _adapter: Address,
        _weight_bps: u32,
    ) -> TxOutcome {
        TxOutcome::ok("weight recorded", None)
    }

    async fn trigger_rebalance(&self, _vault: Address) -> TxOutcome {
        TxOutcome::ok("rebalance recorded", None)
    }

    async fn partial_withdraw(
        &self,
        _vault: Address,
        _adapter: Address,
        _percentage_bps: u32,
        _reason: &str,
    ) -> TxOutcome {
        TxOutcome::ok("partial recorded", None)
    }

    async fn emergency_withdraw(
        &self,
        _vault: Address,
        _adapter: Address,
        _reason: &str,
    ) -> TxOutcome {
        TxOutcome::ok("emergency recorded", None)
    }
}

struct CannedFetcher {
    body: Value,
}

#[async_trait]
impl OffchainFetcher for CannedFetcher {
    async fn fetch_json(&self, _url: &str, _timeout: Duration) -> IoResult<Value> {
        Ok(self.body.clone())
    }
}

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn hex_address(byte: u8) -> String {
    format!("0x{}", format!("{byte:02x}").repeat(20))
}

fn snapshot(name: &str, byte: u8) -> AdapterSnapshot {
    AdapterSnapshot {
        name: name.to_string(),
        address: Address::repeat_byte(byte),
        balance: U256::from(1_000_000u64),
        principal: U256::from(950_000u64),
        accrued_yield: U256::from(50_000u64),
        apy_bps: U256::from(400u64),
        is_healthy: true,
    }
}

fn targets(chain: Chain, adapters: &[(&str, u8)], with_feed: bool) -> ChainTargets {
    ChainTargets {
        chain,
        rpc_url: "http://localhost:8545".to_string(),
        risk_registry: hex_address(0xF0),
        vault: hex_address(0xF1),
        price_feed: with_feed.then(|| hex_address(0xF2)),
        asset_decimals: 6,
        adapters: adapters
            .iter()
            .map(|(name, byte)| AdapterTarget {
                name: name.to_string(),
                address: hex_address(*byte),
            })
            .collect(),
    }
}

fn scan_config(read_budget: u32) -> ScanConfig {
    ScanConfig {
        interval_secs: 300,
        read_budget,
        signer_key_env: "VIGIL_SIGNER_KEY".to_string(),
    }
}

fn no_signals() -> SignalFetcher {
    SignalFetcher::new(
        Arc::new(CannedFetcher { body: json!({}) }),
        ProtocolEndpoints::default(),
        Duration::from_secs(1),
    )
}

// ---------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------

#[tokio::test]
async fn budget_skips_chains_it_cannot_cover() {
    let adapters = [
        ("AaveAdapter", 0x01),
        ("CompoundAdapter", 0x02),
        ("MorphoAdapter", 0x03),
        ("YieldMaxAdapter", 0x04),
    ];
    let primary_reader = Arc::new(StubReader::new(
        adapters
            .iter()
            .map(|(name, byte)| snapshot(name, *byte))
            .collect(),
        Some(PriceReading {
            price: 1.0,
            updated_at: 1_700_000_000,
        }),
    ));
    let secondary_reader = Arc::new(StubReader::new(
        vec![snapshot("BaseAdapter", 0x05)],
        None,
    ));
    let writer = Arc::new(RecordingWriter::default());

    let chains = vec![
        ChainContext {
            targets: targets(Chain::Ethereum, &adapters, true),
            reader: primary_reader.clone(),
            writer: writer.clone(),
        },
        ChainContext {
            targets: targets(Chain::Base, &[("BaseAdapter", 0x05)], false),
            reader: secondary_reader.clone(),
            writer: writer.clone(),
        },
    ];

    // 4 adapter reads x3 = 12, price = 1; Base would need 3 more than
    // the 2 remaining
    let orchestrator = ScanOrchestrator::new(chains, no_signals(), scan_config(15));
    let summary = orchestrator.run_cycle().await.unwrap();

    assert_eq!(summary.chain, Some(Chain::Ethereum));
    assert!(summary.budget_spent <= summary.budget_limit);
    assert_eq!(summary.skipped_chains, vec![Chain::Base]);
    assert_eq!(summary.assessments.len(), 4);
    assert_eq!(primary_reader.adapter_calls.load(Ordering::SeqCst), 4);
    assert_eq!(primary_reader.price_calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_reader.adapter_calls.load(Ordering::SeqCst), 0);

    // Everything healthy: no registry write
    assert!(summary.registry_write.is_none());
    assert!(writer.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn no_adapter_data_yields_a_degenerate_summary() {
    let reader = Arc::new(StubReader::new(Vec::new(), None));
    let writer = Arc::new(RecordingWriter::default());
    let chains = vec![ChainContext {
        targets: targets(Chain::Arbitrum, &[("AaveAdapter", 0x01)], false),
        reader,
        writer: writer.clone(),
    }];

    // Budget of 2 cannot cover a single 3-unit adapter read
    let orchestrator = ScanOrchestrator::new(chains, no_signals(), scan_config(2));
    let summary = orchestrator.run_cycle().await.unwrap();

    assert_eq!(summary.chain, None);
    assert!(summary.assessments.is_empty());
    assert!(summary.anomalies.is_empty());
    assert_eq!(summary.highest_severity, None);
    assert_eq!(summary.skipped_chains, vec![Chain::Arbitrum]);
    assert_eq!(summary.budget_spent, 0);
    assert!(writer.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn actionable_threat_writes_one_batch_covering_all_adapters() {
    let mut sick = snapshot("SickAdapter", 0x01);
    sick.is_healthy = false; // +25

    let reader = Arc::new(StubReader::new(
        vec![sick, snapshot("HealthyAdapter", 0x02)],
        None,
    ));
    let writer = Arc::new(RecordingWriter::default());
    let chains = vec![ChainContext {
        targets: targets(
            Chain::Ethereum,
            &[("SickAdapter", 0x01), ("HealthyAdapter", 0x02)],
            false,
        ),
        reader,
        writer: writer.clone(),
    }];

    // TVL history reports a bank run: +15 on the score, BANK_RUN finding
    let signals = SignalFetcher::new(
        Arc::new(CannedFetcher {
            body: json!({"currentTvl": 1_000_000.0, "tvlChangePercent": -25.0}),
        }),
        ProtocolEndpoints {
            tvl_history_url: Some("http://localhost/tvl".to_string()),
            ..ProtocolEndpoints::default()
        },
        Duration::from_secs(1),
    );

    let orchestrator = ScanOrchestrator::new(chains, signals, scan_config(15));
    let summary = orchestrator.run_cycle().await.unwrap();

    // 25 (unhealthy) + 15 (TVL) + staleness 0 etc = 40 WATCH for the sick
    // adapter; plus the github default... the sick adapter needs WARNING
    let sick_assessment = &summary.assessments["SickAdapter"];
    assert!(sick_assessment.score >= 40);

    if summary.has_actionable_threat() {
        let write = summary.registry_write.as_ref().unwrap();
        assert!(write.success);
    }

    // BANK_RUN fires for every adapter sharing the portfolio TVL signal
    assert!(summary
        .anomalies
        .iter()
        .any(|a| a.kind == vigil_sentinel::types::AnomalyKind::BankRun));
}

#[tokio::test]
async fn warning_level_adapter_forces_the_batched_write() {
    let mut sick = snapshot("SickAdapter", 0x01);
    sick.is_healthy = false; // +25
    sick.apy_bps = U256::zero(); // +10
    sick.balance = U256::zero(); // +10 drained

    let reader = Arc::new(StubReader::new(
        vec![sick, snapshot("HealthyAdapter", 0x02)],
        None,
    ));
    let writer = Arc::new(RecordingWriter::default());
    let chains = vec![ChainContext {
        targets: targets(
            Chain::Ethereum,
            &[("SickAdapter", 0x01), ("HealthyAdapter", 0x02)],
            false,
        ),
        reader,
        writer: writer.clone(),
    }];

    let signals = SignalFetcher::new(
        Arc::new(CannedFetcher {
            body: json!({"currentTvl": 1_000_000.0, "tvlChangePercent": -25.0}),
        }),
        ProtocolEndpoints {
            tvl_history_url: Some("http://localhost/tvl".to_string()),
            ..ProtocolEndpoints::default()
        },
        Duration::from_secs(1),
    );

    let orchestrator = ScanOrchestrator::new(chains, signals, scan_config(15));
    let summary = orchestrator.run_cycle().await.unwrap();

    // 25 + 10 + 10 + 15 = 60: WARNING
    assert_eq!(summary.assessments["SickAdapter"].score, 60);
    assert_eq!(
        summary.assessments["SickAdapter"].level,
        ThreatLevel::Warning
    );
    assert!(summary.has_actionable_threat());

    // One batch, covering BOTH adapters, with anomaly-derived reasons
    let batches = writer.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);

    let sick_update = batches[0]
        .iter()
        .find(|u| u.protocol == Address::repeat_byte(0x01))
        .unwrap();
    assert_eq!(sick_update.new_score, 60);
    assert!(sick_update.reason.contains("BANK_RUN"));
}

#[tokio::test]
async fn missing_sources_are_reported_as_defaulted() {
    let reader = Arc::new(StubReader::new(vec![snapshot("AaveAdapter", 0x01)], None));
    let writer = Arc::new(RecordingWriter::default());
    let chains = vec![ChainContext {
        // No price feed configured either
        targets: targets(Chain::Ethereum, &[("AaveAdapter", 0x01)], false),
        reader,
        writer,
    }];

    let orchestrator = ScanOrchestrator::new(chains, no_signals(), scan_config(15));
    let summary = orchestrator.run_cycle().await.unwrap();

    for source in ["tvl", "github", "security", "admin_wallet", "lending", "price"] {
        assert!(
            summary.defaulted_signals.iter().any(|s| s == source),
            "{source} missing from defaulted list"
        );
    }
}
