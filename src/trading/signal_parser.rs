//! Line-oriented parser for human-written trade signals.
//!
//! ```text
//! BUY NOW EURUSD        <- direction keyword ... symbol
//! Entry 1.1000          <- ignored, market entry
//! SL 1.0950             <- stop loss
//! TP1 1.1050            <- first take profit
//! TP2 1.1100            <- optional second take profit
//! ```

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TradeError};
use crate::models::{EntryMode, OrderType, TakeProfits, TradeRequest};

use super::TradingConfig;

const STOP_LOSS_LINE: usize = 3;
const TAKE_PROFIT_LINE: usize = 4;
const SECOND_TAKE_PROFIT_LINE: usize = 5;

/// Why a message was not treated as a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// First line names neither direction.
    NotASignal,
    /// The instrument is not on the whitelist.
    UnknownSymbol(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotASignal => write!(f, "no buy/sell keyword on the first line"),
            RejectReason::UnknownSymbol(code) => write!(f, "symbol {} is not tradable", code),
        }
    }
}

/// Result of reading a message that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Trade(TradeRequest),
    Rejected(RejectReason),
}

/// Turns signal text into a [`TradeRequest`].
pub struct SignalParser {
    config: TradingConfig,
}

impl SignalParser {
    /// Validates `config` first, so the whitelist is upper-case and the
    /// risk factor in range.
    pub fn new(config: TradingConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    /// Parse a signal.
    ///
    /// Messages that are not trade signals come back as
    /// [`ParseOutcome::Rejected`]; signals that are meant as trades but cannot
    /// be read fail with [`TradeError::MalformedNumber`] or
    /// [`TradeError::InsufficientLines`].
    pub fn parse(&self, text: &str) -> Result<ParseOutcome> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();

        let header = *lines.first().ok_or(TradeError::InsufficientLines {
            found: 0,
            required: TAKE_PROFIT_LINE,
        })?;

        let lowered = header.to_lowercase();
        let order_type = if lowered.contains("buy") {
            OrderType::Buy
        } else if lowered.contains("sell") {
            OrderType::Sell
        } else {
            debug!(line = %header, "No direction keyword, not a signal");
            return Ok(ParseOutcome::Rejected(RejectReason::NotASignal));
        };

        // Non-empty: it contains a keyword.
        let code = last_token(header).unwrap_or_default().to_uppercase();
        let Some(symbol) = self.config.symbol(&code) else {
            debug!(symbol = %code, "Symbol not on whitelist");
            return Ok(ParseOutcome::Rejected(RejectReason::UnknownSymbol(code)));
        };

        // Both directions enter at market; a pending price on line 2 is never read.
        let entry = EntryMode::Market;

        let stop_loss = number_at(&lines, STOP_LOSS_LINE)?;
        let first_tp = number_at(&lines, TAKE_PROFIT_LINE)?;
        let take_profits = if lines.len() >= SECOND_TAKE_PROFIT_LINE {
            TakeProfits::with_second(first_tp, number_at(&lines, SECOND_TAKE_PROFIT_LINE)?)
        } else {
            TakeProfits::new(first_tp)
        };

        let request = TradeRequest::new(
            order_type,
            symbol,
            entry,
            stop_loss,
            take_profits,
            self.config.risk_factor,
        );

        debug!(
            order_type = %request.order_type,
            symbol = %request.symbol,
            stop_loss = request.stop_loss,
            take_profit = request.take_profits.first(),
            second_take_profit = ?request.take_profits.second(),
            "Parsed signal"
        );

        Ok(ParseOutcome::Trade(request))
    }
}

fn last_token(line: &str) -> Option<&str> {
    line.split_whitespace().last()
}

/// Read the last token of a 1-based line as a finite number.
fn number_at(lines: &[&str], line: usize) -> Result<f64> {
    let text = lines.get(line - 1).ok_or(TradeError::InsufficientLines {
        found: lines.len(),
        required: line.max(TAKE_PROFIT_LINE),
    })?;

    let token = last_token(text).unwrap_or_default();
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(TradeError::MalformedNumber {
            line,
            token: token.to_string(),
        }),
    }
}
