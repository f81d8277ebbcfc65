//! Currency normalization.
//!
//! Converts foreign-currency ledger values into the base currency using
//! date-specific historical rates, gap-filled over non-trading days.

mod normalizer;
mod series;

pub use normalizer::{CurrencyNormalizer, RateSource};
pub use series::{CurrencyPair, ExchangeRateSeries};
