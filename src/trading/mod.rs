//! Trading logic: signal parsing, position sizing, execution.

mod config;
mod executor;
mod position_sizer;
mod signal_parser;

pub use config::TradingConfig;
pub use executor::{ExecutionContext, ExecutionOutcome, TradeExecutor};
pub use position_sizer::PositionSizer;
pub use signal_parser::{ParseOutcome, RejectReason, SignalParser};
