//! Reporting groupings over the normalized ledger.

use crate::types::NormalizedTransaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Realized P/L of one instrument, in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPl {
    pub symbol: String,
    pub pl: f64,
}

/// Number of transactions denominated in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyCount {
    pub currency: String,
    pub count: usize,
}

/// P/L per instrument, best first. Ties are ordered by symbol.
pub fn pl_by_instrument(ledger: &[NormalizedTransaction]) -> Vec<InstrumentPl> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for txn in ledger {
        *totals.entry(txn.transaction.symbol.as_str()).or_insert(0.0) += txn.profit_loss_base;
    }

    let mut rows: Vec<InstrumentPl> = totals
        .into_iter()
        .map(|(symbol, pl)| InstrumentPl {
            symbol: symbol.to_string(),
            pl,
        })
        .collect();
    rows.sort_by(|a, b| b.pl.total_cmp(&a.pl));
    rows
}

/// The `limit` best and `limit` worst instruments, without repeats.
///
/// Expects `ranked` in the order produced by [`pl_by_instrument`].
pub fn pl_highlights(ranked: &[InstrumentPl], limit: usize) -> Vec<InstrumentPl> {
    let winners = ranked.iter().take(limit);
    let losers = ranked.iter().skip(ranked.len().saturating_sub(limit));

    let mut highlights: Vec<InstrumentPl> = Vec::with_capacity(limit * 2);
    for row in winners.chain(losers) {
        if !highlights.iter().any(|h| h.symbol == row.symbol) {
            highlights.push(row.clone());
        }
    }
    highlights
}

/// Currency code of every transaction, in ledger order.
pub fn currency_codes<'a>(
    ledger: &'a [NormalizedTransaction],
    base_currency: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    ledger
        .iter()
        .map(move |txn| txn.transaction.currency.code(base_currency))
}

/// Occurrences of each currency code, most frequent first.
///
/// Ties keep the order in which currencies first appear.
pub fn count_by_currency<'a>(codes: impl IntoIterator<Item = &'a str>) -> Vec<CurrencyCount> {
    let mut counts: Vec<CurrencyCount> = Vec::new();
    for code in codes {
        match counts.iter_mut().find(|c| c.currency == code) {
            Some(entry) => entry.count += 1,
            None => counts.push(CurrencyCount {
                currency: code.to_string(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}
