//! Trading configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeError};
use crate::models::Symbol;

/// Instruments accepted in signals unless configured otherwise.
pub const DEFAULT_SYMBOLS: [&str; 7] = [
    "AUDUSD", "EURUSD", "GBPUSD", "USDJPY", "USDCAD", "XAUUSD", "XAGUSD",
];

/// Precious metals, priced in tenths rather than pips.
pub const DEFAULT_METAL_SYMBOLS: [&str; 2] = ["XAUUSD", "XAGUSD"];

/// Configuration for signal parsing and position sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Tradable instrument codes (upper-case)
    pub symbols: Vec<String>,

    /// Subset of `symbols` that use the metal pip multiplier
    pub metal_symbols: Vec<String>,

    /// Fraction of balance risked per trade (0.0 exclusive to 1.0)
    pub risk_factor: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            metal_symbols: DEFAULT_METAL_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            risk_factor: 0.01, // 1% of balance
        }
    }
}

impl TradingConfig {
    /// Default whitelist with a custom risk factor.
    pub fn with_risk_factor(risk_factor: f64) -> Self {
        Self {
            risk_factor,
            ..Default::default()
        }
    }

    /// Normalize symbol codes to upper-case and check invariants.
    pub fn validate(mut self) -> Result<Self> {
        if !(self.risk_factor > 0.0 && self.risk_factor <= 1.0) {
            return Err(TradeError::InvalidConfig(format!(
                "risk factor must be in (0, 1], got {}",
                self.risk_factor
            )));
        }

        self.symbols = normalize(&self.symbols);
        self.metal_symbols = normalize(&self.metal_symbols);

        if self.symbols.is_empty() {
            return Err(TradeError::InvalidConfig(
                "symbol whitelist is empty".to_string(),
            ));
        }

        if let Some(metal) = self.metal_symbols.iter().find(|m| !self.symbols.contains(m)) {
            return Err(TradeError::InvalidConfig(format!(
                "metal symbol {} is not in the whitelist",
                metal
            )));
        }

        Ok(self)
    }

    /// Look up a code (any case) in the whitelist.
    pub fn symbol(&self, code: &str) -> Option<Symbol> {
        let code = code.to_uppercase();
        self.symbols
            .iter()
            .any(|s| *s == code)
            .then(|| Symbol::new_unchecked(code))
    }

    pub fn is_metal(&self, symbol: &Symbol) -> bool {
        self.metal_symbols.iter().any(|m| m == symbol.as_str())
    }
}

fn normalize(codes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = code.trim().to_uppercase();
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}
