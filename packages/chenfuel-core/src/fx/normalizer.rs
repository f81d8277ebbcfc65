//! Conversion of ledger values into the base currency.

use super::series::ExchangeRateSeries;
use crate::types::{Currency, NormalizedTransaction, Transaction};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Where the rate for a foreign currency comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RateSource {
    /// Date-specific rates
    Historical(ExchangeRateSeries),
    /// A single rate applied to every date
    Spot(f64),
}

impl RateSource {
    fn rate_on(&self, date: NaiveDate) -> Option<f64> {
        match self {
            RateSource::Historical(series) => series.rate_on(date),
            RateSource::Spot(rate) if rate.is_finite() && *rate > 0.0 => Some(*rate),
            RateSource::Spot(_) => None,
        }
    }
}

/// Converts transaction values into base currency.
///
/// Unresolvable rates fall back to `default_rate`; the fallback is flagged
/// on the normalized transaction rather than treated as an error.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    sources: BTreeMap<String, RateSource>,
    default_rate: f64,
}

impl CurrencyNormalizer {
    pub fn new(default_rate: f64) -> Self {
        Self {
            sources: BTreeMap::new(),
            default_rate,
        }
    }

    /// Register the rate source for a foreign currency code.
    pub fn with_source(mut self, code: &str, source: RateSource) -> Self {
        self.sources.insert(code.to_uppercase(), source);
        self
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    /// Resolve the foreign-to-base rate for a date.
    ///
    /// Returns the rate and whether the default was substituted.
    pub fn resolve_rate(&self, currency: &Currency, date: NaiveDate) -> (f64, bool) {
        let code = match currency {
            Currency::Base => return (1.0, false),
            Currency::Foreign(code) => code,
        };

        let rate = self
            .sources
            .get(&code.to_uppercase())
            .and_then(|source| source.rate_on(date));

        match rate {
            Some(rate) => (rate, false),
            None => {
                tracing::warn!(
                    "No {} rate for {}, using default {}",
                    code,
                    date,
                    self.default_rate
                );
                (self.default_rate, true)
            }
        }
    }

    /// Convert a single value into base currency.
    pub fn convert(&self, value: f64, currency: &Currency, date: NaiveDate) -> f64 {
        value * self.resolve_rate(currency, date).0
    }

    /// Normalize a transaction. Tax fields are already base currency and are only summed.
    pub fn normalize(&self, transaction: &Transaction) -> NormalizedTransaction {
        let (rate, rate_fallback) = self.resolve_rate(&transaction.currency, transaction.date);

        NormalizedTransaction {
            rate,
            rate_fallback,
            profit_loss_base: transaction.profit_loss * rate,
            fees_base: transaction.fees * rate,
            net_amount_base: transaction.net_amount * rate,
            tax_total_base: transaction.tax_domestic + transaction.tax_foreign,
            transaction: transaction.clone(),
        }
    }

    /// Normalize a ledger, preserving its order.
    pub fn normalize_ledger(&self, transactions: &[Transaction]) -> Vec<NormalizedTransaction> {
        transactions.iter().map(|t| self.normalize(t)).collect()
    }
}
