//! Fixed-risk position sizing: lot size from balance, risk factor and stop
//! distance in pips.

use crate::error::{Result, TradeError};
use crate::models::{Symbol, TradeRequest};

use super::TradingConfig;

/// Price increment of one pip for currency pairs.
pub const FX_PIP: f64 = 0.0001;

/// Price increment of one pip for metals.
pub const METAL_PIP: f64 = 0.1;

/// Lot size together with the stop distance it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub lots: f64,
    pub stop_loss_pips: f64,
}

/// Calculator for risk-based position sizes.
pub struct PositionSizer {
    config: TradingConfig,
}

impl PositionSizer {
    /// Fails with [`TradeError::InvalidConfig`] unless `config` validates.
    pub fn new(config: TradingConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn pip_multiplier(&self, symbol: &Symbol) -> f64 {
        if self.config.is_metal(symbol) {
            METAL_PIP
        } else {
            FX_PIP
        }
    }

    /// Whole pips between entry and stop loss, rounded half to even.
    pub fn stop_loss_pips(&self, request: &TradeRequest) -> Result<f64> {
        let entry = request.entry_price.ok_or(TradeError::UnresolvedEntry)?;
        let multiplier = self.pip_multiplier(&request.symbol);

        let pips = ((request.stop_loss - entry) / multiplier).round_ties_even().abs();
        if pips == 0.0 {
            return Err(TradeError::ZeroStopDistance);
        }

        Ok(pips)
    }

    /// Calculate the position size in lots.
    ///
    /// `floor((balance * risk / pips) / 10 * 100) / 100`, evaluated in that
    /// order so the result truncates to hundredths exactly as the float
    /// operations dictate.
    pub fn size(&self, balance: f64, request: &TradeRequest) -> Result<Sizing> {
        if !(balance.is_finite() && balance > 0.0) {
            return Err(TradeError::NonPositiveBalance(balance));
        }

        let pips = self.stop_loss_pips(request)?;
        let risk_amount = balance * request.risk_factor;

        Ok(Sizing {
            lots: (risk_amount / pips / 10.0 * 100.0).floor() / 100.0,
            stop_loss_pips: pips,
        })
    }
}
