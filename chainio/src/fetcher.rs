//! Off-chain fetch capability
//!
//! The engine only ever sees the parsed JSON payload; transport
//! failures surface as errors that the signal layer converts into
//! conservative defaults.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

const USER_AGENT: &str = concat!("vigil-sentinel/", env!("CARGO_PKG_VERSION"));

/// A single reconciled JSON read from an off-chain source
#[async_trait]
pub trait OffchainFetcher: Send + Sync {
    /// GET `url` and parse the body as JSON
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OffchainFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value> {
        debug!(url, ?timeout, "off-chain fetch");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Value>().await?)
    }
}
