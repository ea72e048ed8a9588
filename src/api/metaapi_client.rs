//! MetaApi cloud client: account provisioning plus the REST client API used
//! for quotes and account information.
//!
//! No request timeout is configured. A stalled call stalls its caller until
//! the caller's own deadline or cancellation fires.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::models::{AccountSnapshot, SymbolPrice};

use super::types::*;
use super::{AccountProvider, PlatformAccount, RpcChannel};

pub const PROVISIONING_URL: &str = "https://mt-provisioning-api-v1.agiliumtrade.agiliumtrade.ai";
pub const DEFAULT_REGION: &str = "new-york";

const AUTH_HEADER: &str = "auth-token";

/// Connection settings for one MetaApi account.
#[derive(Debug, Clone)]
pub struct MetaApiConfig {
    /// MetaApi API token
    pub token: String,

    /// MetaApi account id
    pub account_id: String,

    /// Provisioning API base URL
    pub provisioning_url: String,

    /// Client API region; taken from the account record when unset
    pub region: Option<String>,

    /// First delay between readiness polls
    pub poll_initial: Duration,

    /// Upper bound on the delay between readiness polls
    pub poll_max: Duration,
}

impl MetaApiConfig {
    pub fn new(token: String, account_id: String) -> Self {
        Self {
            token,
            account_id,
            provisioning_url: PROVISIONING_URL.to_string(),
            region: None,
            poll_initial: Duration::from_secs(1),
            poll_max: Duration::from_secs(10),
        }
    }

    /// Client API base URL for a region.
    pub fn client_url(region: &str) -> String {
        format!("https://mt-client-api-v1.{}.agiliumtrade.ai", region)
    }
}

/// Entry point: resolves the configured account.
pub struct MetaApiClient {
    http: Client,
    config: Arc<MetaApiConfig>,
}

impl MetaApiClient {
    pub fn new(config: MetaApiConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl AccountProvider for MetaApiClient {
    async fn get_account(&self) -> Result<Box<dyn PlatformAccount>> {
        let record = fetch_record(&self.http, &self.config).await?;

        debug!(
            account_id = %record.id,
            name = %record.name,
            state = ?record.state,
            region = ?record.region,
            "Fetched account record"
        );

        Ok(Box::new(MetaApiAccount {
            http: self.http.clone(),
            config: self.config.clone(),
            record,
        }))
    }
}

/// Provisioned MetaTrader account.
pub struct MetaApiAccount {
    http: Client,
    config: Arc<MetaApiConfig>,
    record: AccountRecord,
}

impl MetaApiAccount {
    fn region(&self) -> &str {
        self.config
            .region
            .as_deref()
            .or(self.record.region.as_deref())
            .unwrap_or(DEFAULT_REGION)
    }
}

#[async_trait]
impl PlatformAccount for MetaApiAccount {
    fn id(&self) -> &str {
        &self.record.id
    }

    async fn deployment_state(&self) -> Result<DeploymentState> {
        Ok(fetch_record(&self.http, &self.config).await?.state)
    }

    async fn deploy(&self) -> Result<()> {
        let url = format!(
            "{}/users/current/accounts/{}/deploy",
            self.config.provisioning_url, self.config.account_id
        );

        debug!(url = %url, "Requesting deployment");

        let response = self
            .http
            .post(&url)
            .header(AUTH_HEADER, &self.config.token)
            .send()
            .await
            .context("Failed to request deployment")?;

        ensure_success(response, "Deploy").await?;
        info!(account_id = %self.record.id, "Deployment requested");
        Ok(())
    }

    async fn wait_connected(&self) -> Result<()> {
        let http = &self.http;
        let config = &self.config;

        poll_until(config, move || async move {
            let record = fetch_record(http, config).await?;
            debug!(
                state = ?record.state,
                connection = ?record.connection_status,
                "Waiting for broker connection"
            );
            Ok::<_, anyhow::Error>(record.is_connected())
        })
        .await
    }

    fn rpc_channel(&self) -> Box<dyn RpcChannel> {
        Box::new(MetaApiRpcChannel {
            http: self.http.clone(),
            config: self.config.clone(),
            base_url: MetaApiConfig::client_url(self.region()),
            open: false,
        })
    }
}

/// REST rendition of the MetaApi RPC connection.
pub struct MetaApiRpcChannel {
    http: Client,
    config: Arc<MetaApiConfig>,
    base_url: String,
    open: bool,
}

impl MetaApiRpcChannel {
    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/users/current/accounts/{}/{}",
            self.base_url, self.config.account_id, path
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        if !self.open {
            anyhow::bail!("RPC channel is not connected");
        }

        let url = self.account_url(path);
        debug!(url = %url, "Fetching {}", what);

        let response = self
            .http
            .get(&url)
            .header(AUTH_HEADER, &self.config.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        ensure_success(response, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait]
impl RpcChannel for MetaApiRpcChannel {
    async fn connect(&mut self) -> Result<()> {
        self.open = true;
        debug!(base_url = %self.base_url, "RPC channel open");
        Ok(())
    }

    async fn wait_synchronized(&self) -> Result<()> {
        if !self.open {
            anyhow::bail!("RPC channel is not connected");
        }

        let this = self;
        poll_until(&self.config, move || async move {
            let url = this.account_url("account-information");
            let response = this
                .http
                .get(&url)
                .header(AUTH_HEADER, &this.config.token)
                .send()
                .await
                .context("Failed to poll synchronization")?;

            if not_synchronized(response.status()) {
                debug!(status = %response.status(), "Terminal still synchronizing");
                return Ok(false);
            }

            ensure_success(response, "Synchronization check").await?;
            Ok::<_, anyhow::Error>(true)
        })
        .await
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice> {
        let price: PriceResponse = self
            .get_json(&format!("symbols/{}/current-price", symbol), "symbol price")
            .await?;

        debug!(
            symbol = %price.symbol,
            broker_time = ?price.broker_time,
            "Fetched quote"
        );

        Ok(SymbolPrice {
            symbol: price.symbol,
            bid: price.bid,
            ask: price.ask,
        })
    }

    async fn get_account_information(&self) -> Result<AccountSnapshot> {
        self.get_json("account-information", "account information")
            .await
    }
}

async fn fetch_record(http: &Client, config: &MetaApiConfig) -> Result<AccountRecord> {
    let url = format!(
        "{}/users/current/accounts/{}",
        config.provisioning_url, config.account_id
    );

    let response = http
        .get(&url)
        .header(AUTH_HEADER, &config.token)
        .send()
        .await
        .context("Failed to fetch account")?;

    ensure_success(response, "Account")
        .await?
        .json()
        .await
        .context("Failed to parse account response")
}

/// Statuses the client API answers with while the terminal is still
/// replaying state.
fn not_synchronized(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::ACCEPTED
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| format!("{}: {}", e.error, e.message))
        .unwrap_or(body);

    Err(anyhow!("{} request failed: {} - {}", what, status, detail))
}

/// Re-run `probe` until it reports ready. Probe errors end the wait
/// immediately; there is no overall time limit.
async fn poll_until<F, Fut>(config: &MetaApiConfig, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let schedule = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.poll_initial)
        .with_max_interval(config.poll_max)
        .with_max_elapsed_time(None)
        .build();

    backoff::future::retry(schedule, || {
        let ready = probe();
        async move {
            match ready.await {
                Ok(true) => Ok(()),
                Ok(false) => Err(backoff::Error::transient(anyhow!("not ready yet"))),
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}
