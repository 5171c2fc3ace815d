//! Boundary traits for the collaborators around the engine, with in-memory
//! and file-backed implementations.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::core::{Result, TaxYear, Trade};
use crate::tax::{TaxCalculationResult, TaxSettings};
use chrono::NaiveDate;

/// Inclusive date window over trade entry dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// `None` reads from the start of the ledger
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn until(end: NaiveDate) -> Self {
        DateRange { start: None, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && date <= self.end
    }
}

/// Read access to a user's trade history.
pub trait TradeLedger: Send + Sync {
    /// Trades whose entry date falls in `range`, ascending by entry time.
    fn trades(&self, user_id: &str, range: DateRange) -> Result<Vec<Trade>>;
}

/// Read access to per-user tax settings.
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or `None` if the user has none.
    fn settings(&self, user_id: &str) -> Result<Option<TaxSettings>>;
}

/// Append-only store of calculation results.
pub trait ResultStore: Send + Sync {
    /// Most recently stored result for the user and year.
    fn latest(&self, user_id: &str, tax_year: TaxYear) -> Result<Option<TaxCalculationResult>>;

    /// All stored results for the user and year, oldest first.
    fn history(&self, user_id: &str, tax_year: TaxYear) -> Result<Vec<TaxCalculationResult>>;

    /// Persist a result as a new record.
    fn insert(&self, result: &TaxCalculationResult) -> Result<()>;
}
