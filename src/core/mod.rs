pub mod aggregate;
pub mod error;
pub mod lot;
pub mod residency;
pub mod trade;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use aggregate::{aggregate, is_foreign_symbol, Aggregate, AggregateOptions, YearBreakdown};
pub use error::{Result, TaxError};
pub use lot::{match_lots, AccountingMethod, LotBook, LotDisposal, LotStatus, TaxLot};
pub use residency::{RateLookup, RateTable, Residency, TaxYear};
pub use trade::{
    read_trades_csv, read_trades_json, AssetClass, LedgerInput, Side, Trade, TradeRecord,
};
pub use warnings::Warning;
