//! Account session: the deploy → connect → synchronize handshake with one
//! remote account, and the queries that are only valid once it completes.
//!
//! Sessions are single-use. Nothing here times out or retries; a failed or
//! stalled platform call surfaces to the caller as is.

use std::fmt;

use tracing::{debug, info};

use crate::api::{PlatformAccount, RpcChannel};
use crate::error::{Result, TradeError};
use crate::models::{AccountSnapshot, SymbolPrice};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Deploying,
    WaitingDeployed,
    Connecting,
    WaitingSynchronized,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Deploying => "deploying",
            SessionState::WaitingDeployed => "waiting for deployment",
            SessionState::Connecting => "connecting",
            SessionState::WaitingSynchronized => "waiting for synchronization",
            SessionState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// One connection lifecycle against a remote account.
pub struct AccountSession {
    account: Box<dyn PlatformAccount>,
    channel: Option<Box<dyn RpcChannel>>,
    state: SessionState,
}

impl AccountSession {
    pub fn new(account: Box<dyn PlatformAccount>) -> Self {
        Self {
            account,
            channel: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn expect_state(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(TradeError::InvalidTransition {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Deploy the account unless the platform already reports it deployed.
    pub async fn deploy(&mut self) -> Result<()> {
        self.expect_state(SessionState::Disconnected, "deploy")?;
        self.state = SessionState::Deploying;

        let deployment = self
            .account
            .deployment_state()
            .await
            .map_err(|e| TradeError::session("deploy", e))?;

        if deployment.is_deployed() {
            debug!(account_id = %self.account.id(), "Account already deployed");
        } else {
            info!(account_id = %self.account.id(), state = ?deployment, "Deploying account");
            self.account
                .deploy()
                .await
                .map_err(|e| TradeError::session("deploy", e))?;
        }

        self.state = SessionState::WaitingDeployed;
        Ok(())
    }

    pub async fn wait_connected(&mut self) -> Result<()> {
        self.expect_state(SessionState::WaitingDeployed, "wait for connection")?;

        self.account
            .wait_connected()
            .await
            .map_err(|e| TradeError::session("wait for connection", e))?;

        debug!(account_id = %self.account.id(), "Account connected to broker");
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Open the request/response channel.
    pub async fn connect(&mut self) -> Result<()> {
        self.expect_state(SessionState::Connecting, "connect")?;

        let mut channel = self.account.rpc_channel();
        channel
            .connect()
            .await
            .map_err(|e| TradeError::session("connect", e))?;

        self.channel = Some(channel);
        self.state = SessionState::WaitingSynchronized;
        Ok(())
    }

    pub async fn wait_synchronized(&mut self) -> Result<()> {
        self.expect_state(SessionState::WaitingSynchronized, "wait for synchronization")?;

        let channel = self.channel.as_ref().ok_or(TradeError::InvalidTransition {
            operation: "wait for synchronization",
            state: self.state,
        })?;
        channel
            .wait_synchronized()
            .await
            .map_err(|e| TradeError::session("wait for synchronization", e))?;

        info!(account_id = %self.account.id(), "Session ready");
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Run the whole handshake.
    pub async fn establish(&mut self) -> Result<()> {
        self.deploy().await?;
        self.wait_connected().await?;
        self.connect().await?;
        self.wait_synchronized().await
    }

    fn ready_channel(&self) -> Result<&dyn RpcChannel> {
        match (&self.channel, self.state) {
            (Some(channel), SessionState::Ready) => Ok(channel.as_ref()),
            _ => Err(TradeError::NotReady { state: self.state }),
        }
    }

    pub async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice> {
        let price = self
            .ready_channel()?
            .get_symbol_price(symbol)
            .await
            .map_err(|e| TradeError::session("get symbol price", e))?;

        debug!(symbol = %symbol, bid = price.bid, ask = price.ask, spread = price.spread(), "Quote");
        Ok(price)
    }

    pub async fn get_account_information(&self) -> Result<AccountSnapshot> {
        self.ready_channel()?
            .get_account_information()
            .await
            .map_err(|e| TradeError::session("get account information", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakePlatform;

    fn session(platform: &FakePlatform) -> AccountSession {
        AccountSession::new(Box::new(platform.clone()))
    }

    #[tokio::test]
    async fn test_handshake_order() {
        let platform = FakePlatform::new();
        let mut session = session(&platform);

        assert_eq!(session.state(), SessionState::Disconnected);
        session.deploy().await.unwrap();
        assert_eq!(session.state(), SessionState::WaitingDeployed);
        session.wait_connected().await.unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::WaitingSynchronized);
        session.wait_synchronized().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        assert_eq!(
            platform.calls(),
            vec![
                "deployment_state",
                "deploy",
                "wait_connected",
                "connect",
                "wait_synchronized"
            ]
        );
    }

    #[tokio::test]
    async fn test_deploy_skipped_when_already_deployed() {
        let platform = FakePlatform::new().deployed();
        let mut session = session(&platform);

        session.establish().await.unwrap();

        assert_eq!(platform.count("deploy"), 0);
        assert_eq!(platform.count("deployment_state"), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_queries_before_ready() {
        let platform = FakePlatform::new()
            .with_price("EURUSD", 1.1, 1.1002)
            .with_balance(10000.0);
        let mut session = session(&platform);

        let err = session.get_symbol_price("EURUSD").await.unwrap_err();
        assert!(matches!(
            err,
            TradeError::NotReady {
                state: SessionState::Disconnected
            }
        ));

        session.deploy().await.unwrap();
        session.wait_connected().await.unwrap();
        session.connect().await.unwrap();

        let err = session.get_account_information().await.unwrap_err();
        assert!(matches!(
            err,
            TradeError::NotReady {
                state: SessionState::WaitingSynchronized
            }
        ));

        // nothing reached the platform
        assert_eq!(platform.count("get_symbol_price"), 0);
        assert_eq!(platform.count("get_account_information"), 0);
    }

    #[tokio::test]
    async fn test_queries_when_ready() {
        let platform = FakePlatform::new()
            .deployed()
            .with_price("EURUSD", 1.1, 1.1002)
            .with_balance(10000.0);
        let mut session = session(&platform);
        session.establish().await.unwrap();

        let price = session.get_symbol_price("EURUSD").await.unwrap();
        assert_eq!(price.bid, 1.1);
        assert_eq!(price.ask, 1.1002);

        let snapshot = session.get_account_information().await.unwrap();
        assert_eq!(snapshot.balance, 10000.0);
    }

    #[tokio::test]
    async fn test_out_of_order_transition() {
        let platform = FakePlatform::new();
        let mut session = session(&platform);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            TradeError::InvalidTransition {
                operation: "connect",
                state: SessionState::Disconnected
            }
        ));

        session.establish().await.unwrap();
        let err = session.deploy().await.unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_platform_failure_is_wrapped() {
        let platform = FakePlatform::new().failing_on("wait_synchronized");
        let mut session = session(&platform);

        let err = session.establish().await.unwrap_err();
        match err {
            TradeError::Session { operation, source } => {
                assert_eq!(operation, "wait for synchronization");
                assert!(source.to_string().contains("refused"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(session.state(), SessionState::WaitingSynchronized);
    }

    #[tokio::test]
    async fn test_failed_deploy_stops_handshake() {
        let platform = FakePlatform::new().failing_on("deploy");
        let mut session = session(&platform);

        let err = session.establish().await.unwrap_err();
        assert!(matches!(err, TradeError::Session { operation: "deploy", .. }));
        assert_eq!(platform.count("wait_connected"), 0);
    }
}
