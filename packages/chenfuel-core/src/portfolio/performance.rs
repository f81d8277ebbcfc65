//! Ledger performance analytics.

use super::exposure::ExposureSeries;
use super::risk::sharpe_ratio;
use crate::config::AnalysisConfig;
use crate::types::NormalizedTransaction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;

/// Divide, substituting `default` for a zero denominator or a non-finite result.
pub fn safe_ratio(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        return default;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        default
    }
}

/// Ledger-wide sums in base currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub profit_loss: f64,
    pub fees: f64,
    pub tax: f64,
}

impl Totals {
    pub fn from_ledger(ledger: &[NormalizedTransaction]) -> Self {
        ledger.iter().fold(Self::default(), |acc, txn| Self {
            profit_loss: acc.profit_loss + txn.profit_loss_base,
            fees: acc.fees + txn.fees_base,
            tax: acc.tax + txn.tax_total_base,
        })
    }

    /// P/L plus fees (already negative) minus tax.
    pub fn net_return(&self) -> f64 {
        self.profit_loss + self.fees - self.tax
    }
}

impl Add for Totals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            profit_loss: self.profit_loss + other.profit_loss,
            fees: self.fees + other.fees,
            tax: self.tax + other.tax,
        }
    }
}

/// Daily realized P/L on the exposure date axis; days without activity are 0.
pub fn daily_profit_loss(ledger: &[NormalizedTransaction], exposure: &ExposureSeries) -> Vec<f64> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for txn in ledger {
        *by_day.entry(txn.date()).or_insert(0.0) += txn.profit_loss_base;
    }

    exposure
        .dates()
        .map(|date| by_day.get(&date).copied().unwrap_or(0.0))
        .collect()
}

/// Cumulative realized P/L, one point per exposure date.
pub fn equity_curve(daily_pl: &[f64]) -> Vec<f64> {
    daily_pl
        .iter()
        .scan(0.0, |equity, pl| {
            *equity += pl;
            Some(*equity)
        })
        .collect()
}

/// Running peak of the equity curve minus the curve itself.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            peak - value
        })
        .collect()
}

/// Largest peak-to-trough decline of the equity curve, 0 if it never declines.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_series(equity).into_iter().fold(0.0, f64::max)
}

/// Gross wins over gross losses across sells.
///
/// With no losses, reports `sentinel` when there were wins and 0 otherwise.
pub fn profit_factor(ledger: &[NormalizedTransaction], sentinel: f64) -> f64 {
    let (wins, losses) = ledger
        .iter()
        .filter(|txn| txn.action().is_sell())
        .map(|txn| txn.profit_loss_base)
        .fold((0.0, 0.0), |(wins, losses), pl| {
            if pl > 0.0 {
                (wins + pl, losses)
            } else {
                (wins, losses + pl)
            }
        });
    let losses = f64::abs(losses);

    if losses == 0.0 {
        return if wins > 0.0 { sentinel } else { 0.0 };
    }
    safe_ratio(wins, losses, 0.0)
}

/// Percentage of sells closed at a profit, 0 with no sells.
pub fn win_rate(ledger: &[NormalizedTransaction]) -> f64 {
    let sells: Vec<f64> = ledger
        .iter()
        .filter(|txn| txn.action().is_sell())
        .map(|txn| txn.profit_loss_base)
        .collect();

    let winners = sells.iter().filter(|&&pl| pl > 0.0).count();
    safe_ratio(winners as f64, sells.len() as f64, 0.0) * 100.0
}

/// Performance and risk summary in base currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_pl: f64,
    pub total_fees: f64,
    pub total_tax: f64,
    pub total_net_return: f64,
    pub max_exposure: f64,
    pub average_exposure: f64,
    /// Net return over average exposure, in percent
    pub roac_percentage: f64,
    /// Net return over peak exposure, in percent
    pub roi_percentage: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

impl PerformanceSummary {
    /// Calculate every summary statistic from a normalized ledger and its exposure.
    pub fn calculate(
        ledger: &[NormalizedTransaction],
        exposure: &ExposureSeries,
        config: &AnalysisConfig,
    ) -> Self {
        Self::with_totals(Totals::from_ledger(ledger), ledger, exposure, config)
    }

    /// Like [`calculate`](Self::calculate), with totals that may include
    /// amounts from outside the dated ledger.
    pub fn with_totals(
        totals: Totals,
        ledger: &[NormalizedTransaction],
        exposure: &ExposureSeries,
        config: &AnalysisConfig,
    ) -> Self {
        let net_return = totals.net_return();
        let max_exposure = exposure.max();
        let average_exposure = exposure.mean();

        let daily_pl = daily_profit_loss(ledger, exposure);
        let equity = equity_curve(&daily_pl);

        Self {
            total_pl: totals.profit_loss,
            total_fees: totals.fees,
            total_tax: totals.tax,
            total_net_return: net_return,
            max_exposure,
            average_exposure,
            roac_percentage: safe_ratio(net_return, average_exposure, 0.0) * 100.0,
            roi_percentage: safe_ratio(net_return, max_exposure, 0.0) * 100.0,
            profit_factor: profit_factor(ledger, config.profit_factor_sentinel),
            win_rate: win_rate(ledger),
            max_drawdown: max_drawdown(&equity),
            sharpe_ratio: sharpe_ratio(
                &daily_pl,
                exposure,
                config.exposure_noise_floor,
                config.trading_days_per_year,
            ),
        }
    }
}
