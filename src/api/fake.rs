//! In-memory platform for tests. Records every call so tests can assert on
//! the handshake order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{AccountSnapshot, SymbolPrice};

use super::{AccountProvider, DeploymentState, PlatformAccount, RpcChannel};

#[derive(Default)]
struct Inner {
    deployed: bool,
    prices: HashMap<String, SymbolPrice>,
    snapshot: Option<AccountSnapshot>,
    calls: Vec<String>,
    fail_on: Option<&'static str>,
    hang_on: Option<&'static str>,
}

/// Scriptable platform shared between a test and the code under test.
#[derive(Clone, Default)]
pub struct FakePlatform {
    inner: Arc<Mutex<Inner>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployed(self) -> Self {
        self.inner.lock().unwrap().deployed = true;
        self
    }

    pub fn with_price(self, symbol: &str, bid: f64, ask: f64) -> Self {
        self.inner.lock().unwrap().prices.insert(
            symbol.to_string(),
            SymbolPrice {
                symbol: symbol.to_string(),
                bid,
                ask,
            },
        );
        self
    }

    pub fn with_balance(self, balance: f64) -> Self {
        self.inner.lock().unwrap().snapshot =
            Some(AccountSnapshot::new(balance, balance, 0.0, balance));
        self
    }

    pub fn with_snapshot(self, snapshot: AccountSnapshot) -> Self {
        self.inner.lock().unwrap().snapshot = Some(snapshot);
        self
    }

    /// Make the named operation return an error.
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.inner.lock().unwrap().fail_on = Some(operation);
        self
    }

    /// Make the named operation never complete.
    pub fn hanging_on(self, operation: &'static str) -> Self {
        self.inner.lock().unwrap().hang_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    async fn record(&self, operation: &'static str) -> Result<()> {
        let (fail, hang) = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(operation.to_string());
            (inner.fail_on == Some(operation), inner.hang_on == Some(operation))
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(anyhow!("{} refused by platform", operation));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountProvider for FakePlatform {
    async fn get_account(&self) -> Result<Box<dyn PlatformAccount>> {
        self.record("get_account").await?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl PlatformAccount for FakePlatform {
    fn id(&self) -> &str {
        "fake-account"
    }

    async fn deployment_state(&self) -> Result<DeploymentState> {
        self.record("deployment_state").await?;
        let deployed = self.inner.lock().unwrap().deployed;
        Ok(if deployed {
            DeploymentState::Deployed
        } else {
            DeploymentState::Undeployed
        })
    }

    async fn deploy(&self) -> Result<()> {
        self.record("deploy").await?;
        self.inner.lock().unwrap().deployed = true;
        Ok(())
    }

    async fn wait_connected(&self) -> Result<()> {
        self.record("wait_connected").await
    }

    fn rpc_channel(&self) -> Box<dyn RpcChannel> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl RpcChannel for FakePlatform {
    async fn connect(&mut self) -> Result<()> {
        self.record("connect").await
    }

    async fn wait_synchronized(&self) -> Result<()> {
        self.record("wait_synchronized").await
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice> {
        self.record("get_symbol_price").await?;
        self.inner
            .lock()
            .unwrap()
            .prices
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("unknown symbol {}", symbol))
    }

    async fn get_account_information(&self) -> Result<AccountSnapshot> {
        self.record("get_account_information").await?;
        self.inner
            .lock()
            .unwrap()
            .snapshot
            .clone()
            .ok_or_else(|| anyhow!("no account information"))
    }
}
