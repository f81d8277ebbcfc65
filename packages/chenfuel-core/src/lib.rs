//! Chenfuel Core - Portfolio analytics over a transaction ledger.
//!
//! This crate turns a broker's ledger of executed buys and sells into:
//!
//! - **Currency normalization**: foreign values converted at the historical rate of their date
//! - **Exposure**: day-by-day capital at risk, replayed from the ledger
//! - **Performance and risk**: totals, ROAC/ROI, drawdown, Sharpe ratio, profit factor, win rate
//! - **Opportunity cost**: what each sale gained or lost against today's price
//!
//! # Example
//!
//! ```rust,no_run
//! use chenfuel_core::{
//!     run_pipeline, AnalysisConfig, JsonFileSink, JsonLedgerSource, StaticMarketData,
//! };
//! use std::path::Path;
//!
//! let config = AnalysisConfig::load()?;
//! let source = JsonLedgerSource::new("data.json");
//! let market = StaticMarketData::load_from_path(Path::new("market.json"))?;
//! let sink = JsonFileSink::new("web/dashboard_data.json");
//!
//! let report = run_pipeline(&source, &market, &sink, &config, None)?;
//! println!("Net return: {:?}", report.summary.total_net_return);
//! # Ok::<(), chenfuel_core::Error>(())
//! ```

pub mod aggregation;
pub mod analysis;
pub mod config;
pub mod fx;
pub mod market;
pub mod opportunity;
pub mod portfolio;
pub mod sink;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use types::{
    Action, ApiResponse, Currency, NormalizedTransaction, OpportunityRecord, Transaction,
};

// Re-export main functionality
pub use analysis::{
    analyze, run_analysis, run_pipeline, AnalysisReport, DataQuality, Summary, TransactionEntry,
};
pub use config::AnalysisConfig;
pub use fx::{CurrencyNormalizer, CurrencyPair, ExchangeRateSeries, RateSource};
pub use market::{MarketDataProvider, StaticMarketData};
pub use opportunity::{InstrumentQuote, OpportunityReport};
pub use portfolio::{ExposureSeries, PerformanceSummary};
pub use sink::{JsonFileSink, MemorySink, ResultSink};
pub use source::{
    IncompleteRow, InMemoryLedger, JsonLedgerSource, LedgerBatch, LedgerRow, TransactionSource,
};

/// Error types for chenfuel-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Invalid ledger: {0}")]
    InvalidLedger(String),
}

/// Result type for chenfuel-core operations.
pub type Result<T> = std::result::Result<T, Error>;
