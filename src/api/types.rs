//! Response types for the MetaApi provisioning and client APIs.

use serde::{Deserialize, Serialize};

/// Deployment state of a MetaTrader account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Created,
    Deploying,
    Deployed,
    DeployFailed,
    Undeploying,
    Undeployed,
    UndeployFailed,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl DeploymentState {
    pub fn is_deployed(&self) -> bool {
        *self == DeploymentState::Deployed
    }
}

/// Connection between the deployed terminal and the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    DisconnectedFromBroker,
    #[serde(other)]
    Unknown,
}

/// Account record from the provisioning API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub state: DeploymentState,
    #[serde(default = "default_connection_status")]
    pub connection_status: ConnectionStatus,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_connection_status() -> ConnectionStatus {
    ConnectionStatus::Disconnected
}

impl AccountRecord {
    pub fn is_connected(&self) -> bool {
        self.state.is_deployed() && self.connection_status == ConnectionStatus::Connected
    }
}

/// Quote from `/symbols/{symbol}/current-price`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub broker_time: Option<String>,
}

/// Error body returned by MetaApi.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}
