//! End-to-end signal execution: parse, open a session, price the entry, read
//! the balance, size the position.
//!
//! Execution ends at the resolved trade. Submitting it to the broker is left
//! to the caller.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::AccountProvider;
use crate::error::{Result, TradeError};
use crate::models::{AccountSnapshot, OrderType, ResolvedTrade, SymbolPrice, TradeRequest};
use crate::session::AccountSession;

use super::{ParseOutcome, PositionSizer, RejectReason, SignalParser, TradingConfig};

/// Caller-supplied limits on a single execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ExecutionContext {
    /// No deadline, not cancellable.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancel once the sender publishes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Drive `work` until it finishes, the deadline passes, or cancellation
    /// is requested, whichever comes first.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel.as_mut() {
                Some(rx) => {
                    let closed = rx.wait_for(|flag| *flag).await.is_err();
                    // A dropped sender can no longer cancel.
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(TradeError::Cancelled),
            _ = deadline => Err(TradeError::DeadlineExceeded),
            result = work => result,
        }
    }
}

/// Outcome of executing a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Resolved(ResolvedTrade),
    /// The message was not a trade signal; nothing was contacted.
    Rejected(RejectReason),
}

/// Turns signals into resolved trades against one account.
pub struct TradeExecutor {
    parser: SignalParser,
    sizer: PositionSizer,
    provider: Arc<dyn AccountProvider>,
}

impl TradeExecutor {
    /// Fails with [`TradeError::InvalidConfig`] when `config` does not
    /// validate.
    pub fn new(config: TradingConfig, provider: Arc<dyn AccountProvider>) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            parser: SignalParser::new(config.clone())?,
            sizer: PositionSizer::new(config)?,
            provider,
        })
    }

    pub async fn execute(&self, text: &str) -> Result<ExecutionOutcome> {
        self.execute_with(text, &ExecutionContext::unbounded()).await
    }

    /// Execute a signal, giving up when `ctx` says so. Parsing always runs
    /// to completion; only the remote part is bounded.
    pub async fn execute_with(&self, text: &str, ctx: &ExecutionContext) -> Result<ExecutionOutcome> {
        let request = match self.parser.parse(text)? {
            ParseOutcome::Trade(request) => request,
            ParseOutcome::Rejected(reason) => {
                info!(reason = %reason, "Message is not a trade signal");
                return Ok(ExecutionOutcome::Rejected(reason));
            }
        };

        let execution_id = Uuid::new_v4();
        info!(
            execution_id = %execution_id,
            order_type = %request.order_type,
            symbol = %request.symbol,
            "Executing signal"
        );

        match ctx.run(self.resolve(&request)).await {
            Ok(trade) => {
                info!(
                    execution_id = %execution_id,
                    entry = trade.entry,
                    stop_loss_pips = trade.stop_loss_pips,
                    position_size = trade.position_size,
                    "Trade resolved"
                );
                Ok(ExecutionOutcome::Resolved(trade))
            }
            Err(e) => {
                warn!(execution_id = %execution_id, error = %e, "Execution failed");
                Err(e)
            }
        }
    }

    /// Fresh account snapshot over a new session.
    pub async fn account_information(&self) -> Result<AccountSnapshot> {
        self.account_information_with(&ExecutionContext::unbounded())
            .await
    }

    pub async fn account_information_with(&self, ctx: &ExecutionContext) -> Result<AccountSnapshot> {
        ctx.run(async {
            let session = self.open_session().await?;
            session.get_account_information().await
        })
        .await
    }

    async fn open_session(&self) -> Result<AccountSession> {
        let account = self
            .provider
            .get_account()
            .await
            .map_err(|e| TradeError::session("get account", e))?;

        let mut session = AccountSession::new(account);
        session.establish().await?;
        debug!(state = %session.state(), "Session established");
        Ok(session)
    }

    async fn resolve(&self, request: &TradeRequest) -> Result<ResolvedTrade> {
        let session = self.open_session().await?;

        let request = if request.is_market() {
            let price = session.get_symbol_price(request.symbol.as_str()).await?;
            request.with_entry_price(market_entry(request.order_type, &price))
        } else {
            request.clone()
        };

        let snapshot = session.get_account_information().await?;
        debug!(balance = snapshot.balance, "Fetched balance");

        let sizing = self.sizer.size(snapshot.balance, &request)?;
        let request = request.with_position_size(sizing.lots);

        Ok(ResolvedTrade {
            order_type: request.order_type,
            symbol: request.symbol,
            entry: request.entry_price.ok_or(TradeError::UnresolvedEntry)?,
            stop_loss: request.stop_loss,
            take_profits: request.take_profits,
            position_size: sizing.lots,
            stop_loss_pips: sizing.stop_loss_pips,
            risk_factor: request.risk_factor,
            resolved_at: Utc::now(),
        })
    }
}

/// Entry for a market order: the bid for a buy, the ask for a sell.
///
/// This is the reverse of the usual buy-at-ask convention. It is kept as is
/// until a product decision says otherwise.
pub fn market_entry(order_type: OrderType, price: &SymbolPrice) -> f64 {
    match order_type {
        OrderType::Buy => price.bid,
        OrderType::Sell => price.ask,
    }
}
