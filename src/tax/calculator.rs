//! Calculation orchestrator: settings, ledger and previous results in, one
//! persisted result out.

use super::result::TaxCalculationResult;
use super::rules::{apply_rules, RulesInput};
use super::settings::{EffectiveOptions, TaxOptions};
use crate::core::{aggregate, match_lots, Result, Side, TaxError, TaxYear, Trade, Warning};
use crate::store::{DateRange, ResultStore, SettingsStore, TradeLedger};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Run the engine over an in-memory ledger.
///
/// `trades` must be ordered by entry time and should reach back to the start
/// of the ledger so that lots opened in earlier years can be matched.
/// Nothing is read from or written to a store.
pub fn compute(
    user_id: &str,
    tax_year: TaxYear,
    trades: &[Trade],
    options: &EffectiveOptions,
    previous_year_losses: Decimal,
) -> Result<TaxCalculationResult> {
    let residency = options.residency;
    let lots = match_lots(trades, options.method, residency)?;
    let summary = aggregate(&lots, tax_year, residency, options.aggregate_options());

    let outcome = apply_rules(
        RulesInput {
            total_gains: summary.totals.total_gains,
            total_losses: summary.totals.total_losses,
            previous_year_losses,
            offset_losses: options.offset_losses,
            carry_forward: options.carry_forward,
        },
        &residency.rate_table(),
        tax_year,
    );

    let mut warnings: Vec<Warning> = trades
        .iter()
        .filter(|t| t.side == Side::Sell && t.exit_time.is_none())
        .filter(|t| residency.tax_year(t.entry_time.date_naive()) == tax_year)
        .map(|t| Warning::MissingExitTime {
            trade_id: t.id.clone(),
        })
        .collect();
    warnings.extend(outcome.warning);

    Ok(TaxCalculationResult {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        tax_year,
        residency,
        method: options.method,
        total_gains: summary.totals.total_gains,
        total_losses: summary.totals.total_losses,
        net_income: outcome.net_income,
        taxable_income: outcome.taxable_income,
        tax_owed: outcome.tax_owed,
        rate: outcome.rate,
        previous_year_losses: outcome.previous_year_losses,
        carry_forward_losses: outcome.carry_forward_losses,
        foreign_income: summary.totals.foreign_income,
        foreign_tax_paid: summary.totals.foreign_tax_paid,
        fees_paid: summary.totals.fees_paid,
        lots: summary.contributing,
        yearly_breakdown: summary.yearly,
        warnings,
        input_digest: input_digest(tax_year, trades, options, previous_year_losses)?,
        calculated_at: Utc::now(),
    })
}

#[derive(Serialize)]
struct DigestInput<'a> {
    tax_year: TaxYear,
    trades: &'a [Trade],
    options: &'a EffectiveOptions,
    previous_year_losses: Decimal,
}

fn input_digest(
    tax_year: TaxYear,
    trades: &[Trade],
    options: &EffectiveOptions,
    previous_year_losses: Decimal,
) -> Result<String> {
    let bytes = serde_json::to_vec(&DigestInput {
        tax_year,
        trades,
        options,
        previous_year_losses: previous_year_losses.normalize(),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

type LockKey = (String, TaxYear);

/// Coordinates the stores around [`compute`].
///
/// Calculations for the same user and tax year are serialized; other keys run
/// in parallel.
pub struct Calculator {
    ledger: Arc<dyn TradeLedger>,
    settings: Arc<dyn SettingsStore>,
    results: Arc<dyn ResultStore>,
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Calculator {
    pub fn new(
        ledger: Arc<dyn TradeLedger>,
        settings: Arc<dyn SettingsStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Calculator {
            ledger,
            settings,
            results,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Compute and persist the liability for `user_id` in `tax_year`.
    ///
    /// On any error nothing is written.
    pub fn calculate(
        &self,
        user_id: &str,
        tax_year: TaxYear,
        overrides: &TaxOptions,
    ) -> Result<TaxCalculationResult> {
        let key_lock = self.lock_for(user_id, tax_year);
        let outcome = {
            let _guard = key_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.run(user_id, tax_year, overrides)
                .and_then(|result| self.results.insert(&result).map(|()| result))
        };
        self.release_lock(user_id, tax_year, key_lock);

        let result = outcome?;
        log::info!(
            "Persisted result {} for {} tax year {}: tax owed {}",
            result.id,
            user_id,
            result.display_year(),
            result.tax_owed
        );
        Ok(result)
    }

    /// Compute without persisting.
    pub fn preview(
        &self,
        user_id: &str,
        tax_year: TaxYear,
        overrides: &TaxOptions,
    ) -> Result<TaxCalculationResult> {
        self.run(user_id, tax_year, overrides)
    }

    pub fn history(&self, user_id: &str, tax_year: TaxYear) -> Result<Vec<TaxCalculationResult>> {
        self.results.history(user_id, tax_year)
    }

    fn run(
        &self,
        user_id: &str,
        tax_year: TaxYear,
        overrides: &TaxOptions,
    ) -> Result<TaxCalculationResult> {
        let settings = self
            .settings
            .settings(user_id)?
            .ok_or_else(|| TaxError::Configuration {
                user_id: user_id.to_string(),
            })?;
        let options = settings.resolve(overrides)?;
        log::info!(
            "Calculating {} tax year {} for {} ({})",
            options.method,
            options.residency.display_year(tax_year),
            user_id,
            settings.residency
        );

        let previous_year_losses = self.previous_year_losses(user_id, tax_year, &options)?;
        let range = DateRange::until(options.residency.end_date(tax_year));
        let trades = self.ledger.trades(user_id, range)?;
        log::debug!("{} trades in ledger window for {}", trades.len(), user_id);

        compute(user_id, tax_year, &trades, &options, previous_year_losses)
    }

    fn previous_year_losses(
        &self,
        user_id: &str,
        tax_year: TaxYear,
        options: &EffectiveOptions,
    ) -> Result<Decimal> {
        if !options.carry_forward {
            return Ok(Decimal::ZERO);
        }
        if let Some(explicit) = options.previous_year_losses {
            return Ok(explicit);
        }
        match self.results.latest(user_id, tax_year.previous())? {
            Some(previous) => {
                log::debug!(
                    "Carrying forward {} from result {}",
                    previous.carry_forward_losses,
                    previous.id
                );
                Ok(previous.carry_forward_losses)
            }
            None => Ok(Decimal::ZERO),
        }
    }

    fn lock_for(&self, user_id: &str, tax_year: TaxYear) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry((user_id.to_string(), tax_year))
            .or_default()
            .clone()
    }

    /// Drop the map entry once no other caller holds or waits on it
    fn release_lock(&self, user_id: &str, tax_year: TaxYear, key_lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours
        if Arc::strong_count(&key_lock) == 2 {
            locks.remove(&(user_id.to_string(), tax_year));
        }
    }
}
