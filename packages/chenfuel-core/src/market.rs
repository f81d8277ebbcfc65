//! Market data consumed by the analysis.
//!
//! The analysis only needs two things from the market: the latest price of
//! an instrument and a daily exchange-rate history. Both are best-effort;
//! callers fall back when a provider has nothing to offer.

use crate::fx::CurrencyPair;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Source of latest prices and historical exchange rates.
pub trait MarketDataProvider {
    /// Market ticker for a ledger symbol, if one is known.
    fn ticker_for(&self, symbol: &str) -> Option<String>;

    /// Latest price for a ticker. `Ok(None)` when the ticker has no quote.
    fn get_latest_price(&self, ticker: &str) -> Result<Option<f64>>;

    /// Latest prices for a set of tickers. Tickers without a quote are absent.
    fn get_latest_prices(&self, tickers: &BTreeSet<String>) -> Result<BTreeMap<String, f64>> {
        let mut prices = BTreeMap::new();
        for ticker in tickers {
            match self.get_latest_price(ticker) {
                Ok(Some(price)) => {
                    prices.insert(ticker.clone(), price);
                }
                Ok(None) => tracing::debug!("No quote for {}", ticker),
                Err(e) => tracing::warn!("Price lookup for {} failed: {}", ticker, e),
            }
        }
        Ok(prices)
    }

    /// Daily rates (base units per foreign unit) covering at least `[start, end]`.
    fn get_fx_history(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>>;
}

fn usable(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

/// A fixed market snapshot, typically loaded from a JSON file.
///
/// ```json
/// {
///   "tickers": { "APPLE INC": "AAPL" },
///   "prices": { "AAPL": 231.4 },
///   "fx": { "USDILS": { "2024-06-07": 3.71 } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticMarketData {
    /// Ledger symbol to market ticker
    pub tickers: BTreeMap<String, String>,
    /// Latest price per ticker
    pub prices: BTreeMap<String, f64>,
    /// Sparse daily quotes per pair, keyed like `USDILS`
    pub fx: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a JSON file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_ticker(mut self, symbol: &str, ticker: &str) -> Self {
        self.tickers.insert(symbol.to_string(), ticker.to_string());
        self
    }

    pub fn with_price(mut self, ticker: &str, price: f64) -> Self {
        self.prices.insert(ticker.to_string(), price);
        self
    }

    pub fn with_fx_quote(mut self, pair: &CurrencyPair, date: NaiveDate, rate: f64) -> Self {
        self.fx.entry(pair.to_string()).or_default().insert(date, rate);
        self
    }
}

impl MarketDataProvider for StaticMarketData {
    fn ticker_for(&self, symbol: &str) -> Option<String> {
        if let Some(ticker) = self.tickers.get(symbol) {
            return Some(ticker.clone());
        }
        // A symbol that is itself a quoted ticker needs no mapping
        self.prices.contains_key(symbol).then(|| symbol.to_string())
    }

    fn get_latest_price(&self, ticker: &str) -> Result<Option<f64>> {
        Ok(self.prices.get(ticker).copied().and_then(usable))
    }

    fn get_fx_history(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        let quotes = self
            .fx
            .get(&pair.to_string())
            .ok_or_else(|| Error::MarketData(format!("no history for {pair}")))?;
        if start > end {
            return Ok(BTreeMap::new());
        }

        // Include the last quote before the window so its first days can carry it
        let prior = quotes.range(..start).next_back();
        Ok(prior
            .into_iter()
            .chain(quotes.range(start..=end))
            .map(|(date, rate)| (*date, *rate))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn usd_ils() -> CurrencyPair {
        CurrencyPair::new("USD", "ILS")
    }

    #[test]
    fn test_ticker_mapping() {
        let market = StaticMarketData::new()
            .with_ticker("APPLE INC", "AAPL")
            .with_price("AAPL", 230.0)
            .with_price("MSFT", 410.0);

        assert_eq!(market.ticker_for("APPLE INC"), Some("AAPL".to_string()));
        assert_eq!(market.ticker_for("MSFT"), Some("MSFT".to_string()));
        assert_eq!(market.ticker_for("UNKNOWN LTD"), None);
    }

    #[test]
    fn test_unusable_prices_are_absent() {
        let market = StaticMarketData::new()
            .with_price("AAPL", 230.0)
            .with_price("BROKEN", f64::NAN)
            .with_price("ZERO", 0.0);

        let tickers: BTreeSet<String> = ["AAPL", "BROKEN", "ZERO", "NONE"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let prices = market.get_latest_prices(&tickers).unwrap();

        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("AAPL"), Some(&230.0));
    }

    #[test]
    fn test_fx_history_window() {
        let market = StaticMarketData::new()
            .with_fx_quote(&usd_ils(), day(1), 3.6)
            .with_fx_quote(&usd_ils(), day(2), 3.62)
            .with_fx_quote(&usd_ils(), day(5), 3.7)
            .with_fx_quote(&usd_ils(), day(20), 3.9);

        let history = market.get_fx_history(&usd_ils(), day(4), day(10)).unwrap();
        let dates: Vec<NaiveDate> = history.keys().copied().collect();
        assert_eq!(dates, vec![day(2), day(5)]);
    }

    #[test]
    fn test_fx_history_unknown_pair() {
        let result = StaticMarketData::new().get_fx_history(&usd_ils(), day(1), day(2));
        assert!(matches!(result, Err(Error::MarketData(_))));
    }

    #[test]
    fn test_load_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market.json");
        fs::write(
            &path,
            r#"{"tickers":{"APPLE INC":"AAPL"},"prices":{"AAPL":231.4},"fx":{"USDILS":{"2024-06-07":3.71}}}"#,
        )
        .unwrap();

        let market = StaticMarketData::load_from_path(&path).unwrap();
        assert_eq!(market.get_latest_price("AAPL").unwrap(), Some(231.4));
        let history = market.get_fx_history(&usd_ils(), day(7), day(7)).unwrap();
        assert_eq!(history.get(&day(7)), Some(&3.71));
    }
}
