//! Off-chain signal aggregation
//!
//! One fetch set per cycle, for the configured primary protocol. Every
//! source degrades independently: a missing endpoint, a failed fetch, a
//! body that does not parse, or an exhausted budget all resolve to that
//! signal's conservative default, with the source name recorded in
//! `OffchainSignals::defaulted`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use vigil_chainio::{CallBudget, OffchainFetcher, HTTP_FETCH_COST};

use crate::config::ProtocolEndpoints;
use crate::types::{
    AdminWalletSignal, GithubSignal, LendingSignal, MarketMetrics, OffchainSignals,
    PriceSignal, SecuritySignal, TvlSignal,
};

/// Outgoing admin-wallet transfer considered "large", in ETH
const LARGE_OUTFLOW_ETH: f64 = 100.0;

pub struct SignalFetcher {
    fetcher: Arc<dyn OffchainFetcher>,
    endpoints: ProtocolEndpoints,
    timeout: Duration,
}

impl SignalFetcher {
    pub fn new(
        fetcher: Arc<dyn OffchainFetcher>,
        endpoints: ProtocolEndpoints,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            timeout,
        }
    }

    /// Fetch every configured source concurrently, charging one budget
    /// unit per fetch up front. `current_tvl` is reported to the TVL
    /// history endpoint so it can answer with the change against its
    /// stored snapshot.
    ///
    /// The reference price is read on-chain by the scan orchestrator and
    /// injected there; the returned bundle carries the par default.
    pub async fn fetch_all(&self, budget: &mut CallBudget, current_tvl: f64) -> OffchainSignals {
        // Budget charges are sequential and happen before any request
        // goes out, so the meter can never be overrun by a race.
        let tvl_ok =
            self.endpoints.tvl_history_url.is_some() && budget.try_charge(HTTP_FETCH_COST, "tvl");
        let github_ok = self.endpoints.github_repo_url.is_some()
            && budget.try_charge(HTTP_FETCH_COST, "github");
        let security_ok = self.endpoints.security_scan_url.is_some()
            && budget.try_charge(HTTP_FETCH_COST, "security");
        let admin_ok = self.endpoints.admin_wallet_url.is_some()
            && budget.try_charge(HTTP_FETCH_COST, "admin_wallet");
        let lending_ok = self.endpoints.lending_metrics_url.is_some()
            && budget.try_charge(HTTP_FETCH_COST, "lending");

        let now = Utc::now();

        let tvl_fut = async {
            if !tvl_ok {
                return None;
            }
            let base = self.endpoints.tvl_history_url.as_deref()?;
            let url = format!("{base}?tvl={current_tvl:.2}&ts={}", now.timestamp());
            let body = self.get(&url, "tvl").await?;
            parse_tvl(&body)
        };
        let github_fut = async {
            if !github_ok {
                return None;
            }
            let url = self.endpoints.github_repo_url.as_deref()?;
            let body = self.get(url, "github").await?;
            parse_github(&body, now)
        };
        let security_fut = async {
            if !security_ok {
                return None;
            }
            let url = self.endpoints.security_scan_url.as_deref()?;
            let body = self.get(url, "security").await?;
            parse_security(&body)
        };
        let admin_fut = async {
            if !admin_ok {
                return None;
            }
            let url = self.endpoints.admin_wallet_url.as_deref()?;
            let body = self.get(url, "admin_wallet").await?;
            parse_admin_wallet(&body, self.endpoints.admin_wallet.as_deref())
        };
        let lending_fut = async {
            if !lending_ok {
                return None;
            }
            let url = self.endpoints.lending_metrics_url.as_deref()?;
            let body = self.get(url, "lending").await?;
            parse_lending(&body)
        };

        let (tvl, github, security, admin_wallet, lending) =
            tokio::join!(tvl_fut, github_fut, security_fut, admin_fut, lending_fut);

        let mut defaulted = Vec::new();
        let mut fallback = |name: &str| {
            defaulted.push(name.to_string());
        };

        let tvl = tvl.unwrap_or_else(|| {
            fallback("tvl");
            TvlSignal::default_signal()
        });
        let github = github.unwrap_or_else(|| {
            fallback("github");
            GithubSignal::default_signal()
        });
        let security = security.unwrap_or_else(|| {
            fallback("security");
            SecuritySignal::default_signal()
        });
        let admin_wallet = admin_wallet.unwrap_or_else(|| {
            fallback("admin_wallet");
            AdminWalletSignal::default_signal()
        });
        let lending = lending.unwrap_or_else(|| {
            fallback("lending");
            LendingSignal::default_signal()
        });

        if !defaulted.is_empty() {
            warn!(sources = ?defaulted, "off-chain sources fell back to defaults");
        }

        OffchainSignals {
            prices: PriceSignal::default_signal(),
            tvl,
            github,
            security,
            admin_wallet,
            lending,
            defaulted,
        }
    }

    async fn get(&self, url: &str, source: &str) -> Option<Value> {
        match self.fetcher.fetch_json(url, self.timeout).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(source, error = %e, "off-chain fetch failed");
                None
            }
        }
    }
}

/// `{"currentTvl": <number>, "tvlChangePercent": <number>}`
fn parse_tvl(body: &Value) -> Option<TvlSignal> {
    let current_tvl = body.get("currentTvl")?.as_f64()?;
    let change_percent = body.get("tvlChangePercent")?.as_f64()?;
    Some(TvlSignal {
        current_tvl,
        change_percent,
    })
}

/// GitHub repository JSON: `pushed_at` timestamp and issue counts
fn parse_github(body: &Value, now: DateTime<Utc>) -> Option<GithubSignal> {
    let pushed_at = body.get("pushed_at")?.as_str()?;
    let pushed = DateTime::parse_from_rfc3339(pushed_at).ok()?;
    let last_push_days_ago = (now - pushed.with_timezone(&Utc)).num_days().max(0) as u32;

    let open_issues = body
        .get("open_issues_count")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    debug!(last_push_days_ago, open_issues, "github signal parsed");

    Some(GithubSignal {
        recent_commits: open_issues,
        open_issues,
        last_push_days_ago,
    })
}

/// GoPlus-style scanner: `{"result": {"0x..": {"is_honeypot": "1", ..}}}`
/// with string "1"/"0" flags
fn parse_security(body: &Value) -> Option<SecuritySignal> {
    let results = body.get("result")?.as_object()?;
    let flags = results.values().next()?;

    let flag = |key: &str| flags.get(key).and_then(Value::as_str) == Some("1");

    Some(SecuritySignal {
        is_honeypot: flag("is_honeypot"),
        is_open_source: flag("is_open_source"),
        is_proxy: flag("is_proxy"),
        owner_can_change_balance: flag("owner_change_balance"),
        is_mintable: flag("is_mintable"),
    })
}

/// Explorer proxy: `{"result": "<balance wei>", "txlist": [{from, value}, ..]}`.
/// The txlist is optional; without it (or without a configured admin
/// address) outflow detection stays quiet.
fn parse_admin_wallet(body: &Value, admin: Option<&str>) -> Option<AdminWalletSignal> {
    let wei: f64 = body.get("result")?.as_str()?.parse().ok()?;
    let balance_eth = wei / 1e18;

    let recent_large_outflows = match (body.get("txlist").and_then(Value::as_array), admin) {
        (Some(txs), Some(admin)) => {
            let admin = admin.to_lowercase();
            txs.iter().any(|tx| {
                let from = tx
                    .get("from")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                let value_eth = tx
                    .get("value")
                    .and_then(Value::as_str)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.0)
                    / 1e18;
                from == admin && value_eth >= LARGE_OUTFLOW_ETH
            })
        }
        _ => false,
    };

    Some(AdminWalletSignal {
        balance_eth,
        recent_large_outflows,
    })
}

/// Lending metrics proxy: an object of market slugs, each carrying
/// `utilization` plus supply/borrow rates (`supplyApy`/`supplyApr`
/// spellings both accepted)
fn parse_lending(body: &Value) -> Option<LendingSignal> {
    let markets_obj = body.as_object()?;
    let mut markets = std::collections::BTreeMap::new();

    for (slug, market) in markets_obj {
        let Some(utilization_pct) = market.get("utilization").and_then(Value::as_f64) else {
            continue;
        };
        let rate = |a: &str, b: &str| {
            market
                .get(a)
                .or_else(|| market.get(b))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        markets.insert(
            slug.clone(),
            MarketMetrics {
                utilization_pct,
                supply_apy_pct: rate("supplyApy", "supplyApr"),
                borrow_apy_pct: rate("borrowApy", "borrowApr"),
            },
        );
    }

    if markets.is_empty() {
        return None;
    }
    Some(LendingSignal { markets })
}
