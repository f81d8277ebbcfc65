//! Portfolio analytics module.
//!
//! Reconstructs capital exposure from the ledger and derives performance
//! and risk statistics over it.

mod exposure;
mod performance;
mod risk;

pub use exposure::{capital_delta, ExposureSeries};
pub use performance::{
    daily_profit_loss, drawdown_series, equity_curve, max_drawdown, profit_factor, safe_ratio,
    win_rate, PerformanceSummary, Totals,
};
pub use risk::{annualized_sharpe, daily_returns, mean_and_std, sharpe_ratio};
