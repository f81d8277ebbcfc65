//! Gap-filled daily exchange-rate series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A currency pair quoted as base units per one foreign unit.
///
/// `foreign value * rate = base value` everywhere in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub foreign: String,
    pub base: String,
}

impl CurrencyPair {
    pub fn new(foreign: &str, base: &str) -> Self {
        Self {
            foreign: foreign.to_uppercase(),
            base: base.to_uppercase(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.foreign, self.base)
    }
}

/// Daily rate series covering every calendar day of a window.
///
/// Days without a quote take the last quote before them; days before the
/// first quote take the first quote. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSeries {
    rates: BTreeMap<NaiveDate, f64>,
}

impl ExchangeRateSeries {
    /// Build a series over `[start, end]` from sparse quotes.
    ///
    /// Quotes that are not finite and positive are ignored. Quotes outside
    /// the window still seed the carry-forward into it. With no usable
    /// quote, or an inverted window, the series is empty.
    pub fn from_quotes(
        quotes: &BTreeMap<NaiveDate, f64>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let valid: BTreeMap<NaiveDate, f64> = quotes
            .iter()
            .filter(|(_, rate)| rate.is_finite() && **rate > 0.0)
            .map(|(date, rate)| (*date, *rate))
            .collect();

        let Some(first) = valid.values().next().copied() else {
            return Self::default();
        };
        if start > end {
            return Self::default();
        }

        let rates = start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| {
                let rate = valid
                    .range(..=day)
                    .next_back()
                    .map(|(_, rate)| *rate)
                    .unwrap_or(first);
                (day, rate)
            })
            .collect();

        Self { rates }
    }

    /// Rate for a calendar day, if the day lies inside the series window.
    pub fn rate_on(&self, date: NaiveDate) -> Option<f64> {
        self.rates.get(&date).copied()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.rates.keys().next().copied()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.rates.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.rates.iter().map(|(date, rate)| (*date, *rate))
    }
}
