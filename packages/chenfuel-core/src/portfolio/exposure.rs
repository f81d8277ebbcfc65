//! Capital exposure reconstructed from the transaction ledger.

use crate::types::{Action, NormalizedTransaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capital committed (positive) or returned (negative) by one transaction.
///
/// A sell returns its proceeds minus the realized profit/loss, i.e. only the
/// principal that had been at risk. Unrecognized actions have no delta.
pub fn capital_delta(txn: &NormalizedTransaction) -> Option<f64> {
    match txn.action() {
        Action::Buy => Some(txn.net_amount_base.abs()),
        Action::Sell => Some(-(txn.net_amount_base.abs() - txn.profit_loss_base)),
        Action::Other(_) => None,
    }
}

/// Accumulator for the ledger replay.
#[derive(Debug, Default)]
struct Replay {
    daily_deltas: BTreeMap<NaiveDate, f64>,
    excluded: usize,
}

impl Replay {
    fn apply(mut self, txn: &NormalizedTransaction) -> Self {
        match capital_delta(txn) {
            Some(delta) => *self.daily_deltas.entry(txn.date()).or_insert(0.0) += delta,
            None => {
                tracing::warn!(
                    "Excluding {} on {} from exposure: unrecognized action {}",
                    txn.transaction.symbol,
                    txn.date(),
                    txn.action()
                );
                // Keep the day on the axis even if nothing else happened on it
                self.daily_deltas.entry(txn.date()).or_insert(0.0);
                self.excluded += 1;
            }
        }
        self
    }
}

/// Daily capital-at-risk series, clipped at zero.
///
/// Covers every calendar day from the first to the last transaction date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureSeries {
    points: Vec<(NaiveDate, f64)>,
    /// Transactions skipped because their action was not a buy or sell
    excluded: usize,
}

impl ExposureSeries {
    /// Replay a normalized ledger into a daily exposure series.
    pub fn from_ledger(transactions: &[NormalizedTransaction]) -> Self {
        let replay = transactions.iter().fold(Replay::default(), Replay::apply);

        let (Some(first), Some(last)) = (
            replay.daily_deltas.keys().next().copied(),
            replay.daily_deltas.keys().next_back().copied(),
        ) else {
            return Self::default();
        };

        let mut cumulative = 0.0;
        let points = first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| {
                cumulative += replay.daily_deltas.get(&day).copied().unwrap_or(0.0);
                (day, cumulative.max(0.0))
            })
            .collect();

        Self {
            points,
            excluded: replay.excluded,
        }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|(date, _)| *date)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, value)| *value)
    }

    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Peak exposure, 0 for an empty series.
    pub fn max(&self) -> f64 {
        self.values().fold(0.0, f64::max)
    }

    /// Mean exposure over the series, 0 for an empty series.
    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.values().sum::<f64>() / self.points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::CurrencyNormalizer;
    use crate::types::{Currency, Transaction};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn normalize(transactions: &[Transaction]) -> Vec<NormalizedTransaction> {
        CurrencyNormalizer::new(3.7).normalize_ledger(transactions)
    }

    fn buy(d: u32, amount: f64) -> Transaction {
        Transaction::new(day(d), "ACME", Action::Buy, Currency::Base).with_net_amount(-amount)
    }

    fn sell(d: u32, proceeds: f64, pl: f64) -> Transaction {
        Transaction::new(day(d), "ACME", Action::Sell, Currency::Base)
            .with_net_amount(proceeds)
            .with_profit_loss(pl)
    }

    #[test]
    fn test_buy_then_sell_round_trip() {
        let ledger = normalize(&[buy(1, 1000.0), sell(2, 1200.0, 200.0)]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        assert_eq!(exposure.points(), &[(day(1), 1000.0), (day(2), 0.0)]);
        assert_eq!(exposure.max(), 1000.0);
        assert_eq!(exposure.mean(), 500.0);
    }

    #[test]
    fn test_quiet_days_carry_prior_value() {
        let ledger = normalize(&[buy(1, 500.0), buy(4, 300.0)]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        let values: Vec<f64> = exposure.values().collect();
        assert_eq!(values, vec![500.0, 500.0, 500.0, 800.0]);
    }

    #[test]
    fn test_same_day_deltas_are_summed() {
        let ledger = normalize(&[buy(1, 500.0), buy(1, 250.0), sell(1, 100.0, 0.0)]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        assert_eq!(exposure.points(), &[(day(1), 650.0)]);
    }

    #[test]
    fn test_unsorted_ledger_is_replayed_chronologically() {
        let ledger = normalize(&[sell(3, 600.0, 100.0), buy(1, 1000.0)]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        let values: Vec<f64> = exposure.values().collect();
        assert_eq!(values, vec![1000.0, 1000.0, 500.0]);
    }

    #[test]
    fn test_never_negative() {
        // Sell of a position bought before the ledger starts
        let ledger = normalize(&[sell(1, 2000.0, 500.0), buy(2, 1000.0), buy(3, 1000.0)]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        assert!(exposure.values().all(|v| v >= 0.0));
        // Cumulative sum is clipped, not reset
        let values: Vec<f64> = exposure.values().collect();
        assert_eq!(values, vec![0.0, 0.0, 500.0]);
    }

    #[test]
    fn test_unrecognized_action_is_counted() {
        let dividend = Transaction::new(day(2), "ACME", Action::Other("dividend".into()), Currency::Base)
            .with_net_amount(50.0);
        let ledger = normalize(&[buy(1, 1000.0), dividend]);
        let exposure = ExposureSeries::from_ledger(&ledger);

        assert_eq!(exposure.excluded(), 1);
        assert_eq!(exposure.points(), &[(day(1), 1000.0), (day(2), 1000.0)]);
    }

    #[test]
    fn test_empty_ledger() {
        let exposure = ExposureSeries::from_ledger(&[]);
        assert!(exposure.is_empty());
        assert_eq!(exposure.max(), 0.0);
        assert_eq!(exposure.mean(), 0.0);
    }

    #[test]
    fn test_foreign_delta_uses_normalized_amount() {
        let txn = Transaction::new(day(1), "AAPL", Action::Buy, Currency::Foreign("USD".into()))
            .with_net_amount(-100.0);
        let ledger = normalize(&[txn]);

        assert_eq!(capital_delta(&ledger[0]), Some(370.0));
    }
}
