//! Trade request parsed from a signal and the fully resolved trade it becomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "Buy",
            OrderType::Sell => "Sell",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whitelisted instrument code, always upper-case.
///
/// Only [`crate::trading::TradingConfig::symbol`] hands these out, so holding a
/// `Symbol` means the code passed the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub(crate) fn new_unchecked(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the signal wants to enter the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", content = "price")]
pub enum EntryMode {
    /// Enter at the live quote, looked up when the trade is executed.
    Market,
    /// Enter at a fixed price given in the signal.
    Pending(f64),
}

/// Take-profit levels in signal order. The first level is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "Vec<f64>")]
pub struct TakeProfits {
    first: f64,
    second: Option<f64>,
}

impl TakeProfits {
    pub fn new(first: f64) -> Self {
        Self { first, second: None }
    }

    pub fn with_second(first: f64, second: f64) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }

    pub fn first(&self) -> f64 {
        self.first
    }

    pub fn second(&self) -> Option<f64> {
        self.second
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> {
        std::iter::once(self.first).chain(self.second)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

impl From<TakeProfits> for Vec<f64> {
    fn from(tp: TakeProfits) -> Self {
        tp.to_vec()
    }
}

/// A validated trade signal. Each pipeline stage returns a new value instead
/// of mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRequest {
    pub order_type: OrderType,
    pub symbol: Symbol,
    pub entry: EntryMode,
    /// Concrete entry. Known up front for pending entries, filled from a live
    /// quote for market entries.
    pub entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profits: TakeProfits,
    /// Fraction of balance put at risk, in (0, 1].
    pub risk_factor: f64,
    pub position_size: Option<f64>,
}

impl TradeRequest {
    pub fn new(
        order_type: OrderType,
        symbol: Symbol,
        entry: EntryMode,
        stop_loss: f64,
        take_profits: TakeProfits,
        risk_factor: f64,
    ) -> Self {
        let entry_price = match entry {
            EntryMode::Market => None,
            EntryMode::Pending(price) => Some(price),
        };

        Self {
            order_type,
            symbol,
            entry,
            entry_price,
            stop_loss,
            take_profits,
            risk_factor,
            position_size: None,
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self.entry, EntryMode::Market)
    }

    pub fn with_entry_price(&self, price: f64) -> Self {
        Self {
            entry_price: Some(price),
            ..self.clone()
        }
    }

    pub fn with_position_size(&self, size: f64) -> Self {
        Self {
            position_size: Some(size),
            ..self.clone()
        }
    }
}

/// Trade parameters ready to hand to an order-submission capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTrade {
    pub order_type: OrderType,
    pub symbol: Symbol,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profits: TakeProfits,
    pub position_size: f64,
    pub stop_loss_pips: f64,
    pub risk_factor: f64,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedTrade {
    /// Confirmation line relayed to whoever sent the signal.
    pub fn confirmation(&self) -> String {
        format!(
            "Trade placed: {} {} at {}.",
            self.order_type,
            self.symbol,
            format_price(self.entry)
        )
    }
}

/// Shortest round-trip rendering, keeping a trailing `.0` on whole numbers.
pub fn format_price(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> Symbol {
        Symbol::new_unchecked("EURUSD".to_string())
    }

    #[test]
    fn test_market_request_has_no_entry_price() {
        let req = TradeRequest::new(
            OrderType::Buy,
            eurusd(),
            EntryMode::Market,
            1.095,
            TakeProfits::new(1.105),
            0.01,
        );
        assert!(req.is_market());
        assert_eq!(req.entry_price, None);
        assert_eq!(req.position_size, None);

        let priced = req.with_entry_price(1.1);
        assert_eq!(priced.entry_price, Some(1.1));
        assert_eq!(priced.entry, EntryMode::Market);
        // original untouched
        assert_eq!(req.entry_price, None);
    }

    #[test]
    fn test_pending_request_carries_its_price() {
        let req = TradeRequest::new(
            OrderType::Sell,
            eurusd(),
            EntryMode::Pending(1.2),
            1.21,
            TakeProfits::new(1.19),
            0.01,
        );
        assert!(!req.is_market());
        assert_eq!(req.entry_price, Some(1.2));
    }

    #[test]
    fn test_take_profits_keep_signal_order() {
        let tp = TakeProfits::with_second(1.105, 1.11);
        assert_eq!(tp.first(), 1.105);
        assert_eq!(tp.second(), Some(1.11));
        assert_eq!(tp.to_vec(), vec![1.105, 1.11]);
        assert_eq!(TakeProfits::new(1.105).to_vec(), vec![1.105]);
    }

    #[test]
    fn test_confirmation_text() {
        let trade = ResolvedTrade {
            order_type: OrderType::Buy,
            symbol: Symbol::new_unchecked("XAUUSD".to_string()),
            entry: 1900.0,
            stop_loss: 1895.0,
            take_profits: TakeProfits::new(1910.0),
            position_size: 0.2,
            stop_loss_pips: 50.0,
            risk_factor: 0.01,
            resolved_at: Utc::now(),
        };
        assert_eq!(trade.confirmation(), "Trade placed: Buy XAUUSD at 1900.0.");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1.1), "1.1");
        assert_eq!(format_price(1.09505), "1.09505");
        assert_eq!(format_price(10000.0), "10000.0");
        // Exponent forms carry no sign padding.
        assert_eq!(format_price(1e16), "1e16");
        assert_eq!(format_price(1e-7), "1e-7");
    }

    #[test]
    fn test_request_serializes_take_profits_as_list() {
        let req = TradeRequest::new(
            OrderType::Buy,
            eurusd(),
            EntryMode::Market,
            1.095,
            TakeProfits::with_second(1.105, 1.11),
            0.01,
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["symbol"], "EURUSD");
        assert_eq!(json["order_type"], "Buy");
        assert_eq!(json["entry"]["mode"], "Market");
        assert_eq!(json["take_profits"], serde_json::json!([1.105, 1.11]));
    }
}
