//! Data models for trade requests, resolved trades and account state.

mod account;
mod trade;

pub use account::{AccountSnapshot, SymbolPrice};
pub use trade::{EntryMode, OrderType, ResolvedTrade, Symbol, TakeProfits, TradeRequest};
