//! Read-only projections of remote account state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::format_price;

/// Account solvency figures. Always fetched fresh; never reused across
/// requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(balance: f64, equity: f64, margin: f64, free_margin: f64) -> Self {
        Self {
            balance,
            equity,
            margin,
            free_margin,
            fetched_at: Utc::now(),
        }
    }

    /// Four-line account report in chat markdown.
    pub fn report(&self) -> String {
        format!(
            "**Account Information**\n\
            Balance: {}\n\
            Equity: {}\n\
            Margin: {}\n\
            Free Margin: {}",
            format_price(self.balance),
            format_price(self.equity),
            format_price(self.margin),
            format_price(self.free_margin),
        )
    }
}

/// Current quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPrice {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
}

impl SymbolPrice {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let snapshot = AccountSnapshot::new(10000.0, 10012.5, 250.0, 9762.5);
        let report = snapshot.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "**Account Information**",
                "Balance: 10000.0",
                "Equity: 10012.5",
                "Margin: 250.0",
                "Free Margin: 9762.5",
            ]
        );
    }

    #[test]
    fn test_snapshot_from_platform_json() {
        let json = r#"{
            "platform": "mt5",
            "broker": "Demo Broker",
            "currency": "USD",
            "balance": 10000,
            "equity": 10012.5,
            "margin": 250.0,
            "freeMargin": 9762.5,
            "leverage": 100
        }"#;
        let snapshot: AccountSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.balance, 10000.0);
        assert_eq!(snapshot.free_margin, 9762.5);
    }
}
