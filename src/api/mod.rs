//! Trading-platform capabilities consumed by the account session, and the
//! MetaApi cloud implementation of them.

#[cfg(test)]
pub mod fake;
mod metaapi_client;
mod types;

pub use metaapi_client::{MetaApiClient, MetaApiConfig};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AccountSnapshot, SymbolPrice};

/// Hands out the remote account a session talks to.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Fetch a fresh handle on the account. Handles are not reused.
    async fn get_account(&self) -> Result<Box<dyn PlatformAccount>>;
}

/// Lifecycle operations on a remote trading account.
#[async_trait]
pub trait PlatformAccount: Send + Sync {
    fn id(&self) -> &str;

    async fn deployment_state(&self) -> Result<DeploymentState>;

    /// Ask the platform to start the account's terminal.
    async fn deploy(&self) -> Result<()>;

    /// Suspend until the deployed terminal is connected to its broker.
    async fn wait_connected(&self) -> Result<()>;

    /// Request/response channel to the account. Not open until
    /// [`RpcChannel::connect`] succeeds.
    fn rpc_channel(&self) -> Box<dyn RpcChannel>;
}

/// Request/response channel to a connected account.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    async fn connect(&mut self) -> Result<()>;

    /// Suspend until the terminal has replayed account and market state.
    async fn wait_synchronized(&self) -> Result<()>;

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice>;

    async fn get_account_information(&self) -> Result<AccountSnapshot>;
}
