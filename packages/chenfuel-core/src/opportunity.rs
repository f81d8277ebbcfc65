//! Opportunity cost of past sales.
//!
//! Compares each sale with the instrument's current price: what holding
//! instead of selling would have gained (positive) or lost (negative).

use crate::types::{OpportunityRecord, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current quote for a ledger instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentQuote {
    /// Market ticker the ledger symbol maps to
    pub ticker: String,
    /// Latest price, in the instrument's trading currency
    pub price: f64,
}

/// Compare one sale with a current price.
///
/// Returns `None` when the comparison is not finite.
pub fn evaluate_sale(
    sale: &Transaction,
    quote: &InstrumentQuote,
    base_currency: &str,
) -> Option<OpportunityRecord> {
    let diff_per_unit = quote.price - sale.price;
    let total_missed = diff_per_unit * sale.quantity.abs();
    if !diff_per_unit.is_finite() || !total_missed.is_finite() {
        return None;
    }

    Some(OpportunityRecord {
        date: sale.date,
        symbol: sale.symbol.clone(),
        ticker: quote.ticker.clone(),
        quantity: sale.quantity.abs(),
        sale_price: sale.price,
        current_price: quote.price,
        diff_per_unit,
        total_missed,
        currency: sale.currency.code(base_currency).to_string(),
        is_success: total_missed < 0.0,
    })
}

/// Evaluate every sale whose instrument has a quote, in ledger order.
///
/// Non-sell transactions and sales without a quote are skipped.
pub fn evaluate_sales(
    transactions: &[Transaction],
    quotes: &BTreeMap<String, InstrumentQuote>,
    base_currency: &str,
) -> Vec<OpportunityRecord> {
    transactions
        .iter()
        .filter(|txn| txn.action.is_sell())
        .filter_map(|sale| {
            let quote = quotes.get(&sale.symbol)?;
            evaluate_sale(sale, quote, base_currency)
        })
        .collect()
}

/// Sales that cost the most by not holding, largest missed upside first.
pub fn top_regrets(records: &[OpportunityRecord], limit: usize) -> Vec<OpportunityRecord> {
    let mut regrets: Vec<OpportunityRecord> =
        records.iter().filter(|r| !r.is_success).cloned().collect();
    // Stable sort keeps ledger order among ties
    regrets.sort_by(|a, b| b.total_missed.total_cmp(&a.total_missed));
    regrets.truncate(limit);
    regrets
}

/// Sales that avoided the largest subsequent decline, most negative first.
pub fn top_smart_moves(records: &[OpportunityRecord], limit: usize) -> Vec<OpportunityRecord> {
    let mut smart: Vec<OpportunityRecord> =
        records.iter().filter(|r| r.is_success).cloned().collect();
    smart.sort_by(|a, b| a.total_missed.total_cmp(&b.total_missed));
    smart.truncate(limit);
    smart
}

/// Every evaluated sale plus the two ranked views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityReport {
    pub all: Vec<OpportunityRecord>,
    pub top_regrets: Vec<OpportunityRecord>,
    pub top_smart_moves: Vec<OpportunityRecord>,
}

impl OpportunityReport {
    pub fn from_records(records: Vec<OpportunityRecord>, limit: usize) -> Self {
        Self {
            top_regrets: top_regrets(&records, limit),
            top_smart_moves: top_smart_moves(&records, limit),
            all: records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Currency};
    use chrono::NaiveDate;

    fn sale(symbol: &str, quantity: f64, price: f64) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2023, 11, 2).unwrap();
        Transaction::new(date, symbol, Action::Sell, Currency::Foreign("USD".to_string()))
            .with_fill(quantity, price)
    }

    fn quote(ticker: &str, price: f64) -> InstrumentQuote {
        InstrumentQuote {
            ticker: ticker.to_string(),
            price,
        }
    }

    fn quotes(entries: &[(&str, f64)]) -> BTreeMap<String, InstrumentQuote> {
        entries
            .iter()
            .map(|(symbol, price)| (symbol.to_string(), quote(symbol, *price)))
            .collect()
    }

    #[test]
    fn test_price_fell_after_sale_is_success() {
        let record = evaluate_sale(&sale("ACME", 10.0, 100.0), &quote("ACM", 80.0), "ILS").unwrap();

        assert_eq!(record.diff_per_unit, -20.0);
        assert_eq!(record.total_missed, -200.0);
        assert!(record.is_success);
        assert_eq!(record.ticker, "ACM");
        assert_eq!(record.currency, "USD");
    }

    #[test]
    fn test_price_rose_after_sale_is_regret() {
        let record = evaluate_sale(&sale("ACME", 10.0, 100.0), &quote("ACM", 120.0), "ILS").unwrap();

        assert_eq!(record.diff_per_unit, 20.0);
        assert_eq!(record.total_missed, 200.0);
        assert!(!record.is_success);
    }

    #[test]
    fn test_unchanged_price_is_not_success() {
        let record = evaluate_sale(&sale("ACME", 10.0, 100.0), &quote("ACM", 100.0), "ILS").unwrap();
        assert_eq!(record.total_missed, 0.0);
        assert!(!record.is_success);
    }

    #[test]
    fn test_negative_quantity_uses_magnitude() {
        let mut txn = sale("ACME", 0.0, 100.0);
        txn.quantity = -10.0;
        let record = evaluate_sale(&txn, &quote("ACM", 80.0), "ILS").unwrap();
        assert_eq!(record.quantity, 10.0);
        assert_eq!(record.total_missed, -200.0);
    }

    #[test]
    fn test_unquoted_and_non_sell_excluded() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
        let buy = Transaction::new(date, "ACME", Action::Buy, Currency::Base).with_fill(5.0, 90.0);
        let ledger = vec![buy, sale("ACME", 10.0, 100.0), sale("OBSCURE", 3.0, 7.0)];

        let records = evaluate_sales(&ledger, &quotes(&[("ACME", 110.0)]), "ILS");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "ACME");
    }

    #[test]
    fn test_ranked_views() {
        let ledger = vec![
            sale("A", 1.0, 100.0),  // +50 regret
            sale("B", 1.0, 100.0),  // -30 smart
            sale("C", 1.0, 100.0),  // +10 regret
            sale("D", 1.0, 100.0),  // -80 smart
            sale("E", 1.0, 100.0),  // +50 regret, ties with A
        ];
        let prices = quotes(&[("A", 150.0), ("B", 70.0), ("C", 110.0), ("D", 20.0), ("E", 150.0)]);

        let records = evaluate_sales(&ledger, &prices, "ILS");
        let report = OpportunityReport::from_records(records, 5);

        let regrets: Vec<&str> = report.top_regrets.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(regrets, vec!["A", "E", "C"]);

        let smart: Vec<&str> = report.top_smart_moves.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(smart, vec!["D", "B"]);
        assert_eq!(report.all.len(), 5);
    }

    #[test]
    fn test_views_are_bounded() {
        let ledger: Vec<Transaction> = (0..8).map(|i| sale("A", 1.0, 100.0 - i as f64)).collect();
        let records = evaluate_sales(&ledger, &quotes(&[("A", 200.0)]), "ILS");

        let report = OpportunityReport::from_records(records, 5);
        assert_eq!(report.top_regrets.len(), 5);
        assert!(report.top_smart_moves.is_empty());
        assert_eq!(report.top_regrets[0].total_missed, 107.0);
    }
}
