//! End-to-end ledger analysis.
//!
//! Runs the stages in dependency order:
//!
//! 1. normalize the ledger into base currency,
//! 2. replay it into a daily exposure series,
//! 3. derive performance and risk statistics,
//! 4. compare every sale with today's price,
//!
//! and assembles the result into an [`AnalysisReport`] in which every
//! floating value is finite or explicitly absent.

use crate::aggregation::{
    count_by_currency, currency_codes, pl_by_instrument, pl_highlights, InstrumentPl,
};
use crate::config::AnalysisConfig;
use crate::fx::{CurrencyNormalizer, CurrencyPair, ExchangeRateSeries, RateSource};
use crate::market::MarketDataProvider;
use crate::opportunity::{evaluate_sales, InstrumentQuote, OpportunityReport};
use crate::portfolio::{ExposureSeries, PerformanceSummary, Totals};
use crate::sink::ResultSink;
use crate::source::{LedgerBatch, TransactionSource};
use crate::types::{Action, Currency, NormalizedTransaction, Transaction};
use crate::Result;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Summary statistics; `None` marks a value that was not finite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_pl: Option<f64>,
    pub total_fees: Option<f64>,
    pub total_tax: Option<f64>,
    pub total_net_return: Option<f64>,
    pub max_exposure: Option<f64>,
    pub average_exposure: Option<f64>,
    pub roac_percentage: Option<f64>,
    pub roi_percentage: Option<f64>,
    pub profit_factor: Option<f64>,
    pub win_rate: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub sharpe_ratio: Option<f64>,
}

/// Everything that was excluded, substituted or sanitized during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Rows the source could not use at all
    pub rejected_rows: usize,
    /// Rows without a date or currency; they count toward totals and
    /// currency counts but not toward the timeline
    pub incomplete_rows: usize,
    /// Transactions that are neither buys nor sells
    pub unrecognized_actions: usize,
    /// Transactions converted with the default rate
    pub fx_fallbacks: usize,
    /// Sales without an opportunity record: no quote, or no finite comparison
    pub unquoted_sells: usize,
    /// Non-finite values replaced by `None`
    pub sanitized_values: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Rows supplied by the source, incomplete and rejected ones included
    pub row_count: usize,
    pub transaction_count: usize,
    pub base_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

/// One ledger transaction as reported, amounts in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: Action,
    /// Code of the currency the transaction was recorded in
    pub currency: String,
    pub quantity: Option<f64>,
    /// Execution price in the recorded currency
    pub price: Option<f64>,
    pub rate: Option<f64>,
    pub rate_fallback: bool,
    pub profit_loss: Option<f64>,
    pub fees: Option<f64>,
    pub net_amount: Option<f64>,
    pub tax: Option<f64>,
}

/// Result of a full analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: Summary,
    pub exposure_history: Vec<(NaiveDate, Option<f64>)>,
    pub opportunities: OpportunityReport,
    pub by_instrument: Vec<(String, Option<f64>)>,
    /// Best and worst instruments by P/L
    pub pl_highlights: Vec<(String, Option<f64>)>,
    pub by_currency: Vec<(String, usize)>,
    /// Every complete transaction, in ledger order
    pub transactions: Vec<TransactionEntry>,
    pub data_quality: DataQuality,
    pub metadata: Metadata,
}

/// Replaces non-finite values with `None` and counts them.
#[derive(Debug, Default)]
struct Sanitizer {
    replaced: usize,
}

impl Sanitizer {
    fn finite(&mut self, field: &str, value: f64) -> Option<f64> {
        if value.is_finite() {
            Some(value)
        } else {
            tracing::warn!("Non-finite {} ({}) reported as absent", field, value);
            self.replaced += 1;
            None
        }
    }

    fn summary(&mut self, perf: &PerformanceSummary) -> Summary {
        Summary {
            total_pl: self.finite("total_pl", perf.total_pl),
            total_fees: self.finite("total_fees", perf.total_fees),
            total_tax: self.finite("total_tax", perf.total_tax),
            total_net_return: self.finite("total_net_return", perf.total_net_return),
            max_exposure: self.finite("max_exposure", perf.max_exposure),
            average_exposure: self.finite("average_exposure", perf.average_exposure),
            roac_percentage: self.finite("roac_percentage", perf.roac_percentage),
            roi_percentage: self.finite("roi_percentage", perf.roi_percentage),
            profit_factor: self.finite("profit_factor", perf.profit_factor),
            win_rate: self.finite("win_rate", perf.win_rate),
            max_drawdown: self.finite("max_drawdown", perf.max_drawdown),
            sharpe_ratio: self.finite("sharpe_ratio", perf.sharpe_ratio),
        }
    }

    fn instruments(&mut self, rows: &[InstrumentPl]) -> Vec<(String, Option<f64>)> {
        rows.iter()
            .map(|row| (row.symbol.clone(), self.finite("instrument pl", row.pl)))
            .collect()
    }

    fn entry(&mut self, txn: &NormalizedTransaction, base_currency: &str) -> TransactionEntry {
        let raw = &txn.transaction;
        TransactionEntry {
            date: raw.date,
            symbol: raw.symbol.clone(),
            action: raw.action.clone(),
            currency: raw.currency.code(base_currency).to_string(),
            quantity: self.finite("quantity", raw.quantity),
            price: self.finite("price", raw.price),
            rate: self.finite("rate", txn.rate),
            rate_fallback: txn.rate_fallback,
            profit_loss: self.finite("transaction pl", txn.profit_loss_base),
            fees: self.finite("transaction fees", txn.fees_base),
            net_amount: self.finite("transaction net amount", txn.net_amount_base),
            tax: self.finite("transaction tax", txn.tax_total_base),
        }
    }
}

/// Date window for FX history requests: the ledger span padded on both sides.
pub fn fx_window(transactions: &[Transaction], buffer_days: i64) -> Option<(NaiveDate, NaiveDate)> {
    let first = transactions.iter().map(|t| t.date).min()?;
    let last = transactions.iter().map(|t| t.date).max()?;
    let buffer = Duration::days(buffer_days.max(0));

    Some((
        first.checked_sub_signed(buffer).unwrap_or(first),
        last.checked_add_signed(buffer).unwrap_or(last),
    ))
}

/// Build a normalizer with one rate source per foreign currency in the ledger.
///
/// History comes from the provider; a failed or empty lookup falls back to a
/// configured spot rate, and without one every conversion uses the default.
pub fn build_normalizer<M>(
    transactions: &[Transaction],
    market: &M,
    config: &AnalysisConfig,
) -> CurrencyNormalizer
where
    M: MarketDataProvider + ?Sized,
{
    let mut normalizer = CurrencyNormalizer::new(config.default_fx_rate);
    let Some((start, end)) = fx_window(transactions, config.fx_buffer_days) else {
        return normalizer;
    };

    let foreign: BTreeSet<&str> = transactions
        .iter()
        .filter_map(|t| match &t.currency {
            Currency::Foreign(code) => Some(code.as_str()),
            Currency::Base => None,
        })
        .collect();

    for code in foreign {
        let pair = CurrencyPair::new(code, &config.base_currency);
        let history = match market.get_fx_history(&pair, start, end) {
            Ok(quotes) if !quotes.is_empty() => Some(quotes),
            Ok(_) => {
                tracing::warn!("Empty {} history for {} to {}", pair, start, end);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} history: {}", pair, e);
                None
            }
        };

        let source = match (history, config.spot_rate(code)) {
            (Some(quotes), _) => {
                let series = ExchangeRateSeries::from_quotes(&quotes, start, end);
                tracing::debug!("{} series covers {} days", pair, series.len());
                Some(RateSource::Historical(series))
            }
            (None, Some(spot)) => Some(RateSource::Spot(spot)),
            (None, None) => None,
        };

        if let Some(source) = source {
            normalizer = normalizer.with_source(code, source);
        }
    }

    normalizer
}

/// Resolve a current quote for every instrument that was sold.
///
/// Instruments without a ticker mapping or a price are left out.
pub fn fetch_quotes<M>(
    transactions: &[Transaction],
    market: &M,
) -> BTreeMap<String, InstrumentQuote>
where
    M: MarketDataProvider + ?Sized,
{
    let tickers: BTreeMap<&str, String> = transactions
        .iter()
        .filter(|t| t.action.is_sell())
        .filter_map(|t| Some((t.symbol.as_str(), market.ticker_for(&t.symbol)?)))
        .collect();

    let wanted: BTreeSet<String> = tickers.values().cloned().collect();
    let prices = match market.get_latest_prices(&wanted) {
        Ok(prices) => prices,
        Err(e) => {
            tracing::warn!("Failed to fetch latest prices: {}", e);
            BTreeMap::new()
        }
    };

    tickers
        .into_iter()
        .filter_map(|(symbol, ticker)| {
            let price = *prices.get(&ticker)?;
            Some((symbol.to_string(), InstrumentQuote { ticker, price }))
        })
        .collect()
}

/// Analyze a validated ledger against resolved rates and quotes.
///
/// Pure and deterministic: the same inputs always give the same report.
pub fn analyze(
    batch: &LedgerBatch,
    normalizer: &CurrencyNormalizer,
    quotes: &BTreeMap<String, InstrumentQuote>,
    config: &AnalysisConfig,
    as_of: Option<NaiveDate>,
) -> AnalysisReport {
    let base = config.base_currency.trim().to_uppercase();
    let transactions = &batch.transactions;
    let ledger = normalizer.normalize_ledger(transactions);
    let exposure = ExposureSeries::from_ledger(&ledger);

    // Incomplete rows add what they can without a date or rate
    let totals = batch
        .incomplete
        .iter()
        .fold(Totals::from_ledger(&ledger), |acc, row| acc + row.totals());
    let performance = PerformanceSummary::with_totals(totals, &ledger, &exposure, config);

    let records = evaluate_sales(transactions, quotes, &base);
    let opportunities = OpportunityReport::from_records(records, config.top_n);

    let ranked = pl_by_instrument(&ledger);
    let highlights = pl_highlights(&ranked, config.top_n);

    let mut sanitizer = Sanitizer::default();
    let summary = sanitizer.summary(&performance);
    let exposure_history = exposure
        .points()
        .iter()
        .map(|(date, value)| (*date, sanitizer.finite("exposure", *value)))
        .collect();
    let by_instrument = sanitizer.instruments(&ranked);
    let pl_highlights = sanitizer.instruments(&highlights);
    let entries = ledger.iter().map(|txn| sanitizer.entry(txn, &base)).collect();

    let by_currency = count_by_currency(
        currency_codes(&ledger, &base)
            .chain(batch.incomplete.iter().map(|row| row.currency_label(&base))),
    )
    .into_iter()
    .map(|c| (c.currency, c.count))
    .collect();

    let sells = transactions.iter().filter(|t| t.action.is_sell()).count();
    let data_quality = DataQuality {
        rejected_rows: batch.rejected.len(),
        incomplete_rows: batch.incomplete.len(),
        unrecognized_actions: exposure.excluded(),
        fx_fallbacks: ledger.iter().filter(|t| t.rate_fallback).count(),
        unquoted_sells: sells.saturating_sub(opportunities.all.len()),
        sanitized_values: sanitizer.replaced,
    };

    if data_quality != DataQuality::default() {
        tracing::warn!("Data quality: {:?}", data_quality);
    }

    AnalysisReport {
        summary,
        exposure_history,
        opportunities,
        by_instrument,
        pl_highlights,
        by_currency,
        transactions: entries,
        data_quality,
        metadata: Metadata {
            row_count: batch.row_count(),
            transaction_count: transactions.len(),
            base_currency: base,
            as_of,
        },
    }
}

/// Analyze a ledger, resolving rates and quotes through a market data provider.
pub fn run_analysis<M>(
    batch: &LedgerBatch,
    market: &M,
    config: &AnalysisConfig,
    as_of: Option<NaiveDate>,
) -> AnalysisReport
where
    M: MarketDataProvider + ?Sized,
{
    tracing::info!(
        "Analyzing {} transactions ({} incomplete, {} rejected rows)",
        batch.transactions.len(),
        batch.incomplete.len(),
        batch.rejected.len()
    );

    let normalizer = build_normalizer(&batch.transactions, market, config);
    let quotes = fetch_quotes(&batch.transactions, market);
    let report = analyze(batch, &normalizer, &quotes, config, as_of);

    tracing::info!(
        "Analysis complete: {} exposure days, {} opportunity records",
        report.exposure_history.len(),
        report.opportunities.all.len()
    );
    report
}

/// Load a ledger, analyze it and publish the report.
pub fn run_pipeline<S, M, K>(
    source: &S,
    market: &M,
    sink: &K,
    config: &AnalysisConfig,
    as_of: Option<NaiveDate>,
) -> Result<AnalysisReport>
where
    S: TransactionSource + ?Sized,
    M: MarketDataProvider + ?Sized,
    K: ResultSink + ?Sized,
{
    let batch = source.load(config)?;
    let report = run_analysis(&batch, market, config, as_of);
    sink.publish(&report)?;
    Ok(report)
}
