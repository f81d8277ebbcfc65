//! Core data types for the ledger analytics pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an executed transaction.
///
/// Anything the ledger labels as neither a buy nor a sell is kept as
/// `Other` so it can be counted as a data-quality exclusion downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Other(String),
}

impl Action {
    /// Parse a raw ledger label.
    ///
    /// Accepts `buy`/`sell` in any case and the Hebrew broker labels
    /// (`קניה`, `מכירה`) found in exported statements.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "buy" | "b" | "קניה" | "קנייה" => Action::Buy,
            "sell" | "s" | "מכירה" => Action::Sell,
            _ => Action::Other(trimmed.to_string()),
        }
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Action::Sell)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("buy"),
            Action::Sell => f.write_str("sell"),
            Action::Other(label) => write!(f, "other({label})"),
        }
    }
}

/// Denomination of a transaction's monetary fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// The reporting currency; values pass through normalization unchanged.
    Base,
    /// Any other currency, identified by its code (e.g. `USD`).
    Foreign(String),
}

impl Currency {
    /// Currency code, resolving `Base` to the configured base code.
    pub fn code<'a>(&'a self, base_code: &'a str) -> &'a str {
        match self {
            Currency::Base => base_code,
            Currency::Foreign(code) => code,
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Currency::Base)
    }
}

/// A single executed transaction from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Execution date
    pub date: NaiveDate,
    /// Instrument name as it appears in the ledger
    pub symbol: String,
    /// Buy, sell or an unrecognized action
    pub action: Action,
    /// Executed quantity (always a non-negative magnitude)
    pub quantity: f64,
    /// Per-unit execution price, in `currency`
    pub price: f64,
    /// Denomination of price, fees, profit/loss and net amount
    pub currency: Currency,
    /// Commissions and management fees, stored as a signed deduction
    pub fees: f64,
    /// Realized profit/loss (meaningful on sells only)
    pub profit_loss: f64,
    /// Domestic tax withheld or refunded, already in base currency
    pub tax_domestic: f64,
    /// Foreign tax, already in base currency
    pub tax_foreign: f64,
    /// Net settlement amount before tax
    pub net_amount: f64,
}

impl Transaction {
    /// Create a transaction with zeroed monetary fields.
    pub fn new(date: NaiveDate, symbol: &str, action: Action, currency: Currency) -> Self {
        Self {
            date,
            symbol: symbol.to_string(),
            action,
            quantity: 0.0,
            price: 0.0,
            currency,
            fees: 0.0,
            profit_loss: 0.0,
            tax_domestic: 0.0,
            tax_foreign: 0.0,
            net_amount: 0.0,
        }
    }

    /// Set quantity and price; the quantity sign is discarded.
    pub fn with_fill(mut self, quantity: f64, price: f64) -> Self {
        self.quantity = quantity.abs();
        self.price = price;
        self
    }

    pub fn with_net_amount(mut self, net_amount: f64) -> Self {
        self.net_amount = net_amount;
        self
    }

    pub fn with_profit_loss(mut self, profit_loss: f64) -> Self {
        self.profit_loss = profit_loss;
        self
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_taxes(mut self, domestic: f64, foreign: f64) -> Self {
        self.tax_domestic = domestic;
        self.tax_foreign = foreign;
        self
    }
}

/// A transaction with its monetary fields expressed in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub transaction: Transaction,
    /// Rate applied to the currency-denominated fields
    pub rate: f64,
    /// Whether `rate` came from the configured default instead of market data
    pub rate_fallback: bool,
    pub profit_loss_base: f64,
    pub fees_base: f64,
    pub net_amount_base: f64,
    /// Domestic plus foreign tax; never converted
    pub tax_total_base: f64,
}

impl NormalizedTransaction {
    pub fn date(&self) -> NaiveDate {
        self.transaction.date
    }

    pub fn action(&self) -> &Action {
        &self.transaction.action
    }
}

/// Counterfactual comparison of a sale against the instrument's current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub ticker: String,
    pub quantity: f64,
    pub sale_price: f64,
    pub current_price: f64,
    pub diff_per_unit: f64,
    pub total_missed: f64,
    pub currency: String,
    /// True when selling beat holding (the missed amount is negative)
    pub is_success: bool,
}

/// API response wrapper used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
