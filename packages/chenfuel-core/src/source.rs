//! Transaction ledger sources.
//!
//! Raw rows are loosely typed: every field may be missing and numbers may
//! arrive as text with thousands separators. Validation sorts them into
//! complete [`Transaction`]s, incomplete rows that still carry usable
//! amounts, and rejected rows.

use crate::config::AnalysisConfig;
use crate::portfolio::Totals;
use crate::types::{Action, Currency, Transaction};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Symbol used for rows without an instrument name.
pub const UNKNOWN_SYMBOL: &str = "Unknown";

/// Currency label reported for rows without a currency.
pub const UNKNOWN_CURRENCY: &str = "Unknown";

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A numeric cell as exported: a JSON number or formatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    /// Parsed value of the cell, which may be non-finite.
    ///
    /// Blank text reads as `Some(0.0)`; text that is not a number as `None`.
    pub fn parse(&self) -> Option<f64> {
        match self {
            RawNumber::Number(n) => Some(*n),
            RawNumber::Text(text) => {
                let cleaned: String = text.chars().filter(|c| *c != ',').collect();
                let cleaned = cleaned.trim();
                if cleaned.is_empty() {
                    return Some(0.0);
                }
                cleaned.parse::<f64>().ok()
            }
        }
    }

    /// Finite value of the cell, if any.
    pub fn value(&self) -> Option<f64> {
        self.parse().filter(|v| v.is_finite())
    }
}

/// An unvalidated ledger row.
///
/// Field names also accept the column headers of the broker's statement export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerRow {
    #[serde(alias = "תאריך ביצוע")]
    pub date: Option<String>,
    #[serde(alias = "שם ני\"ע")]
    pub symbol: Option<String>,
    #[serde(alias = "פעולה")]
    pub action: Option<String>,
    #[serde(alias = "כמות ביצוע")]
    pub quantity: Option<RawNumber>,
    #[serde(alias = "שער ביצוע")]
    pub price: Option<RawNumber>,
    #[serde(alias = "מטבע")]
    pub currency: Option<String>,
    #[serde(alias = "עמלות ודמי ניהול")]
    pub fees: Option<RawNumber>,
    #[serde(alias = "רווח/הפסד")]
    pub profit_loss: Option<RawNumber>,
    #[serde(alias = "מס שנוכה/הוחזר בארץ")]
    pub tax_domestic: Option<RawNumber>,
    #[serde(alias = "מס חו\"ל בשקלים")]
    pub tax_foreign: Option<RawNumber>,
    #[serde(alias = "תמורה נטו לפני מס")]
    pub net_amount: Option<RawNumber>,
}

/// Parse a ledger date, dropping any time of day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Why a row did not become a complete transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum RowDefect {
    /// Date or currency is missing; the amounts are still usable
    Incomplete(String),
    /// A cell cannot be used at all
    Invalid(String),
}

impl RowDefect {
    pub fn reason(&self) -> &str {
        match self {
            RowDefect::Incomplete(reason) | RowDefect::Invalid(reason) => reason,
        }
    }
}

/// Numeric cells of a row, read before any other validation.
#[derive(Debug, Clone, Copy, Default)]
struct Amounts {
    quantity: f64,
    price: f64,
    fees: f64,
    profit_loss: f64,
    tax_domestic: f64,
    tax_foreign: f64,
    net_amount: f64,
}

fn number(cell: &Option<RawNumber>, field: &str) -> std::result::Result<f64, RowDefect> {
    let Some(cell) = cell else {
        return Ok(0.0);
    };
    match cell.parse() {
        Some(value) if value.is_finite() => Ok(value),
        Some(value) => Err(RowDefect::Invalid(format!("non-finite {field} '{value}'"))),
        None => Err(RowDefect::Invalid(format!("unreadable {field}"))),
    }
}

impl LedgerRow {
    fn amounts(&self) -> std::result::Result<Amounts, RowDefect> {
        Ok(Amounts {
            quantity: number(&self.quantity, "quantity")?,
            price: number(&self.price, "price")?,
            fees: number(&self.fees, "fees")?,
            profit_loss: number(&self.profit_loss, "profit_loss")?,
            tax_domestic: number(&self.tax_domestic, "tax_domestic")?,
            tax_foreign: number(&self.tax_foreign, "tax_foreign")?,
            net_amount: number(&self.net_amount, "net_amount")?,
        })
    }

    fn symbol(&self) -> &str {
        non_empty(&self.symbol).unwrap_or(UNKNOWN_SYMBOL)
    }

    /// Validate the row.
    ///
    /// Numeric cells must be blank or finite numbers, otherwise the row is
    /// invalid. A row without a parseable date or a currency is incomplete.
    /// A missing symbol becomes [`UNKNOWN_SYMBOL`], missing numbers become 0,
    /// and a missing action is kept as an unrecognized one.
    pub fn to_transaction(
        &self,
        config: &AnalysisConfig,
    ) -> std::result::Result<Transaction, RowDefect> {
        let amounts = self.amounts()?;

        let raw_date =
            non_empty(&self.date).ok_or_else(|| RowDefect::Incomplete("missing date".into()))?;
        let date = parse_date(raw_date)
            .ok_or_else(|| RowDefect::Incomplete(format!("unparseable date '{raw_date}'")))?;
        let currency = non_empty(&self.currency)
            .ok_or_else(|| RowDefect::Incomplete("missing currency".into()))?;

        let action = Action::parse(non_empty(&self.action).unwrap_or_default());

        Ok(
            Transaction::new(date, self.symbol(), action, config.resolve_currency(currency))
                .with_fill(amounts.quantity, amounts.price)
                .with_fees(amounts.fees)
                .with_profit_loss(amounts.profit_loss)
                .with_taxes(amounts.tax_domestic, amounts.tax_foreign)
                .with_net_amount(amounts.net_amount),
        )
    }

    /// Keep what an incomplete row still contributes.
    fn to_incomplete(
        &self,
        index: usize,
        reason: String,
        config: &AnalysisConfig,
    ) -> std::result::Result<IncompleteRow, RowDefect> {
        let amounts = self.amounts()?;
        Ok(IncompleteRow {
            index,
            reason,
            symbol: self.symbol().to_string(),
            currency: non_empty(&self.currency).map(|label| config.resolve_currency(label)),
            profit_loss: amounts.profit_loss,
            fees: amounts.fees,
            tax_domestic: amounts.tax_domestic,
            tax_foreign: amounts.tax_foreign,
        })
    }
}

/// A row that could not be turned into a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// Zero-based position in the source
    pub index: usize,
    pub reason: String,
}

/// A row with no usable date or currency.
///
/// It cannot be placed on the timeline, and a foreign amount cannot be
/// converted, but its tax and its currency label still count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteRow {
    /// Zero-based position in the source
    pub index: usize,
    pub reason: String,
    pub symbol: String,
    /// `None` when the row has no currency
    pub currency: Option<Currency>,
    pub profit_loss: f64,
    pub fees: f64,
    pub tax_domestic: f64,
    pub tax_foreign: f64,
}

impl IncompleteRow {
    /// Currency code for reporting, [`UNKNOWN_CURRENCY`] when absent.
    pub fn currency_label<'a>(&'a self, base_code: &'a str) -> &'a str {
        self.currency
            .as_ref()
            .map_or(UNKNOWN_CURRENCY, |currency| currency.code(base_code))
    }

    /// Base-currency totals that need neither a date nor a rate.
    ///
    /// Tax is always counted. P/L and fees only when the row is in base currency.
    pub fn totals(&self) -> Totals {
        let (profit_loss, fees) = match self.currency {
            Some(Currency::Base) => (self.profit_loss, self.fees),
            _ => (0.0, 0.0),
        };
        Totals {
            profit_loss,
            fees,
            tax: self.tax_domestic + self.tax_foreign,
        }
    }
}

/// Validated transactions plus the rows that could not be used in full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerBatch {
    pub transactions: Vec<Transaction>,
    pub incomplete: Vec<IncompleteRow>,
    pub rejected: Vec<RejectedRow>,
}

impl LedgerBatch {
    /// Validate raw rows, keeping ledger order.
    pub fn from_rows(rows: &[LedgerRow], config: &AnalysisConfig) -> Self {
        let mut batch = Self::default();
        for (index, row) in rows.iter().enumerate() {
            batch.push_row(index, row, config);
        }
        batch
    }

    /// Decode and validate untyped rows one by one.
    ///
    /// A row that does not have the shape of a [`LedgerRow`] is rejected
    /// without affecting the others.
    pub fn from_values(values: Vec<Value>, config: &AnalysisConfig) -> Self {
        let mut batch = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<LedgerRow>(value) {
                Ok(row) => batch.push_row(index, &row, config),
                Err(e) => batch.reject(index, format!("malformed row: {e}")),
            }
        }
        batch
    }

    fn push_row(&mut self, index: usize, row: &LedgerRow, config: &AnalysisConfig) {
        match row.to_transaction(config) {
            Ok(txn) => self.transactions.push(txn),
            Err(RowDefect::Incomplete(reason)) => match row.to_incomplete(index, reason, config) {
                Ok(partial) => {
                    tracing::warn!("Ledger row {} is incomplete: {}", index, partial.reason);
                    self.incomplete.push(partial);
                }
                Err(defect) => self.reject(index, defect.reason().to_string()),
            },
            Err(RowDefect::Invalid(reason)) => self.reject(index, reason),
        }
    }

    fn reject(&mut self, index: usize, reason: String) {
        tracing::warn!("Rejecting ledger row {}: {}", index, reason);
        self.rejected.push(RejectedRow { index, reason });
    }

    pub fn row_count(&self) -> usize {
        self.transactions.len() + self.incomplete.len() + self.rejected.len()
    }
}

/// Supplier of the transaction ledger.
pub trait TransactionSource {
    fn load(&self, config: &AnalysisConfig) -> Result<LedgerBatch>;
}

/// Ledger stored as a JSON array of rows.
#[derive(Debug, Clone)]
pub struct JsonLedgerSource {
    path: PathBuf,
}

impl JsonLedgerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionSource for JsonLedgerSource {
    fn load(&self, config: &AnalysisConfig) -> Result<LedgerBatch> {
        if !self.path.exists() {
            return Err(Error::InvalidLedger(format!(
                "ledger file not found: {}",
                self.path.display()
            )));
        }

        let content = fs::read_to_string(&self.path)?;
        let rows: Vec<Value> = serde_json::from_str(&content)?;
        tracing::debug!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(LedgerBatch::from_values(rows, config))
    }
}

/// Already-validated transactions held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    pub transactions: Vec<Transaction>,
}

impl InMemoryLedger {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }
}

impl TransactionSource for InMemoryLedger {
    fn load(&self, _config: &AnalysisConfig) -> Result<LedgerBatch> {
        Ok(LedgerBatch {
            transactions: self.transactions.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05.03.2024"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 14:31:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_raw_number() {
        assert_eq!(RawNumber::Text("1,234.50".into()).value(), Some(1234.5));
        assert_eq!(RawNumber::Text(" -7 ".into()).value(), Some(-7.0));
        assert_eq!(RawNumber::Text("n/a".into()).value(), None);
        assert_eq!(RawNumber::Text("NaN".into()).value(), None);
        assert_eq!(RawNumber::Number(3.5).value(), Some(3.5));

        assert_eq!(RawNumber::Text("  ".into()).parse(), Some(0.0));
        assert_eq!(RawNumber::Text("inf".into()).parse(), Some(f64::INFINITY));
        assert_eq!(RawNumber::Text("n/a".into()).parse(), None);
    }

    #[test]
    fn test_row_with_hebrew_headers() {
        let json = r#"{
            "תאריך ביצוע": "2024-03-05",
            "שם ני\"ע": "APPLE INC",
            "פעולה": "מכירה",
            "כמות ביצוע": "-10",
            "שער ביצוע": "180.5",
            "מטבע": "דולר",
            "עמלות ודמי ניהול": "-4.2",
            "תמורה נטו לפני מס": "1,800.8",
            "רווח/הפסד": 300,
            "מס שנוכה/הוחזר בארץ": 75,
            "מס חו\"ל בשקלים": 0
        }"#;
        let row: LedgerRow = serde_json::from_str(json).unwrap();
        let txn = row.to_transaction(&AnalysisConfig::default()).unwrap();

        assert_eq!(txn.date, day(2024, 3, 5));
        assert_eq!(txn.symbol, "APPLE INC");
        assert_eq!(txn.action, Action::Sell);
        assert_eq!(txn.quantity, 10.0);
        assert_eq!(txn.price, 180.5);
        assert_eq!(txn.currency, Currency::Foreign("USD".to_string()));
        assert_eq!(txn.fees, -4.2);
        assert_eq!(txn.net_amount, 1800.8);
        assert_eq!(txn.profit_loss, 300.0);
        assert_eq!(txn.tax_domestic, 75.0);
    }

    #[test]
    fn test_missing_fields() {
        let config = AnalysisConfig::default();
        let row = LedgerRow {
            date: Some("2024-01-02".into()),
            currency: Some("שקל".into()),
            ..Default::default()
        };
        let txn = row.to_transaction(&config).unwrap();
        assert_eq!(txn.symbol, UNKNOWN_SYMBOL);
        assert_eq!(txn.action, Action::Other(String::new()));
        assert_eq!(txn.currency, Currency::Base);
        assert_eq!(txn.net_amount, 0.0);

        let no_date = LedgerRow {
            currency: Some("ILS".into()),
            ..Default::default()
        };
        assert_eq!(
            no_date.to_transaction(&config),
            Err(RowDefect::Incomplete("missing date".to_string()))
        );

        let no_currency = LedgerRow {
            date: Some("2024-01-02".into()),
            ..Default::default()
        };
        assert_eq!(
            no_currency.to_transaction(&config),
            Err(RowDefect::Incomplete("missing currency".to_string()))
        );
    }

    #[test]
    fn test_non_finite_cell_rejects_row() {
        let config = AnalysisConfig::default();
        let row = LedgerRow {
            date: Some("2024-01-02".into()),
            currency: Some("ILS".into()),
            action: Some("sell".into()),
            profit_loss: Some(RawNumber::Text("inf".into())),
            ..Default::default()
        };
        assert!(matches!(row.to_transaction(&config), Err(RowDefect::Invalid(_))));

        let unreadable = LedgerRow {
            fees: Some(RawNumber::Text("n/a".into())),
            ..row.clone()
        };
        let batch = LedgerBatch::from_rows(&[row, unreadable], &config);
        assert!(batch.transactions.is_empty());
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected[0].reason, "non-finite profit_loss 'inf'");
        assert_eq!(batch.rejected[1].reason, "unreadable fees");
    }

    #[test]
    fn test_incomplete_row_keeps_amounts() {
        let config = AnalysisConfig::default();
        let rows = vec![
            LedgerRow {
                date: Some("2024-01-02".into()),
                action: Some("sell".into()),
                profit_loss: Some(RawNumber::Number(40.0)),
                tax_domestic: Some(RawNumber::Number(75.0)),
                ..Default::default()
            },
            LedgerRow {
                currency: Some("ILS".into()),
                profit_loss: Some(RawNumber::Number(10.0)),
                fees: Some(RawNumber::Number(-1.0)),
                tax_foreign: Some(RawNumber::Number(2.0)),
                ..Default::default()
            },
            LedgerRow {
                currency: Some("USD".into()),
                profit_loss: Some(RawNumber::Number(10.0)),
                ..Default::default()
            },
        ];

        let batch = LedgerBatch::from_rows(&rows, &config);
        assert!(batch.transactions.is_empty());
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.incomplete.len(), 3);
        assert_eq!(batch.row_count(), 3);

        let no_currency = &batch.incomplete[0];
        assert_eq!(no_currency.currency_label("ILS"), UNKNOWN_CURRENCY);
        assert_eq!(
            no_currency.totals(),
            Totals {
                profit_loss: 0.0,
                fees: 0.0,
                tax: 75.0
            }
        );

        let base_no_date = &batch.incomplete[1];
        assert_eq!(base_no_date.currency_label("ILS"), "ILS");
        assert_eq!(
            base_no_date.totals(),
            Totals {
                profit_loss: 10.0,
                fees: -1.0,
                tax: 2.0
            }
        );

        // A foreign amount without a date has no rate
        let foreign_no_date = &batch.incomplete[2];
        assert_eq!(foreign_no_date.currency_label("ILS"), "USD");
        assert_eq!(foreign_no_date.totals(), Totals::default());
    }

    #[test]
    fn test_batch_counts_rejections() {
        let rows = vec![
            LedgerRow {
                date: Some("2024-01-02".into()),
                currency: Some("ILS".into()),
                action: Some("buy".into()),
                ..Default::default()
            },
            LedgerRow {
                date: Some("not a date".into()),
                currency: Some("ILS".into()),
                ..Default::default()
            },
        ];

        let batch = LedgerBatch::from_rows(&rows, &AnalysisConfig::default());
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.incomplete.len(), 1);
        assert_eq!(batch.incomplete[0].index, 1);
        assert_eq!(batch.incomplete[0].reason, "unparseable date 'not a date'");
        assert_eq!(batch.row_count(), 2);
    }

    #[test]
    fn test_json_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"[{"date":"2024-01-02","symbol":"TEVA","action":"Buy","quantity":5,"price":40,"currency":"ILS","net_amount":-200}]"#,
        )
        .unwrap();

        let batch = JsonLedgerSource::new(&path)
            .load(&AnalysisConfig::default())
            .unwrap();
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].symbol, "TEVA");
        assert_eq!(batch.transactions[0].net_amount, -200.0);
    }

    #[test]
    fn test_json_source_isolates_malformed_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"[
                {"date":"2024-01-02","symbol":"TEVA","action":"Buy","currency":"ILS","net_amount":-200},
                {"date":20240103,"symbol":"TEVA","action":"Sell","currency":"ILS","net_amount":210}
            ]"#,
        )
        .unwrap();

        let batch = JsonLedgerSource::new(&path)
            .load(&AnalysisConfig::default())
            .unwrap();
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].net_amount, -200.0);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
        assert!(batch.rejected[0].reason.starts_with("malformed row"));
    }

    #[test]
    fn test_json_source_requires_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, r#"{"date":"2024-01-02"}"#).unwrap();

        let result = JsonLedgerSource::new(&path).load(&AnalysisConfig::default());
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_json_source_missing_file() {
        let dir = tempdir().unwrap();
        let result = JsonLedgerSource::new(dir.path().join("absent.json")).load(&AnalysisConfig::default());
        assert!(matches!(result, Err(Error::InvalidLedger(_))));
    }
}
