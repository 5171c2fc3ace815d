use super::{DateRange, ResultStore, SettingsStore, TradeLedger};
use crate::core::{Result, TaxError, TaxYear, Trade};
use crate::tax::{TaxCalculationResult, TaxSettings};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process store for embedding the engine and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    trades: RwLock<HashMap<String, Vec<Trade>>>,
    settings: RwLock<HashMap<String, TaxSettings>>,
    results: RwLock<Vec<TaxCalculationResult>>,
}

fn poisoned<T>(_: T) -> TaxError {
    TaxError::Store("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a user's trades, kept sorted by entry time
    pub fn put_trades(&self, user_id: &str, mut trades: Vec<Trade>) -> Result<()> {
        trades.sort_by_key(|t| t.entry_time);
        self.trades
            .write()
            .map_err(poisoned)?
            .insert(user_id.to_string(), trades);
        Ok(())
    }

    pub fn put_settings(&self, user_id: &str, settings: TaxSettings) -> Result<()> {
        self.settings
            .write()
            .map_err(poisoned)?
            .insert(user_id.to_string(), settings);
        Ok(())
    }
}

impl TradeLedger for MemoryStore {
    fn trades(&self, user_id: &str, range: DateRange) -> Result<Vec<Trade>> {
        let trades = self.trades.read().map_err(poisoned)?;
        Ok(trades
            .get(user_id)
            .map(|all| {
                all.iter()
                    .filter(|t| range.contains(t.entry_time.date_naive()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl SettingsStore for MemoryStore {
    fn settings(&self, user_id: &str) -> Result<Option<TaxSettings>> {
        Ok(self.settings.read().map_err(poisoned)?.get(user_id).cloned())
    }
}

impl ResultStore for MemoryStore {
    fn latest(&self, user_id: &str, tax_year: TaxYear) -> Result<Option<TaxCalculationResult>> {
        Ok(self
            .results
            .read()
            .map_err(poisoned)?
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.tax_year == tax_year)
            .cloned())
    }

    fn history(&self, user_id: &str, tax_year: TaxYear) -> Result<Vec<TaxCalculationResult>> {
        Ok(self
            .results
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|r| r.user_id == user_id && r.tax_year == tax_year)
            .cloned()
            .collect())
    }

    fn insert(&self, result: &TaxCalculationResult) -> Result<()> {
        self.results.write().map_err(poisoned)?.push(result.clone());
        Ok(())
    }
}
