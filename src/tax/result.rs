use crate::core::{AccountingMethod, Residency, TaxLot, TaxYear, Warning, YearBreakdown};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Computed liability for one user and tax year.
///
/// Every run produces a new record; stored results are never updated, so the
/// history shows how the liability was computed over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxCalculationResult {
    #[schemars(with = "String")]
    pub id: Uuid,
    pub user_id: String,
    pub tax_year: TaxYear,
    pub residency: Residency,
    pub method: AccountingMethod,
    #[schemars(with = "f64")]
    pub total_gains: Decimal,
    #[schemars(with = "f64")]
    pub total_losses: Decimal,
    #[schemars(with = "f64")]
    pub net_income: Decimal,
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    #[schemars(with = "f64")]
    pub tax_owed: Decimal,
    /// Rate applied to taxable income
    #[schemars(with = "f64")]
    pub rate: Decimal,
    /// Prior-year losses brought into the offset
    #[schemars(with = "f64")]
    pub previous_year_losses: Decimal,
    #[schemars(with = "f64")]
    pub carry_forward_losses: Decimal,
    #[schemars(with = "f64")]
    pub foreign_income: Decimal,
    #[schemars(with = "f64")]
    pub foreign_tax_paid: Decimal,
    #[schemars(with = "f64")]
    pub fees_paid: Decimal,
    /// Lots realised in the tax year
    pub lots: Vec<TaxLot>,
    /// Totals for every tax year with a disposal in the ledger window
    pub yearly_breakdown: BTreeMap<TaxYear, YearBreakdown>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    /// SHA-256 of the trades, options and carryforward the result was computed from
    pub input_digest: String,
    #[schemars(with = "String")]
    pub calculated_at: DateTime<Utc>,
}

impl TaxCalculationResult {
    /// True when both results carry the same figures, ignoring identity and timestamp
    pub fn same_figures(&self, other: &TaxCalculationResult) -> bool {
        self.input_digest == other.input_digest
            && self.total_gains == other.total_gains
            && self.total_losses == other.total_losses
            && self.taxable_income == other.taxable_income
            && self.tax_owed == other.tax_owed
            && self.carry_forward_losses == other.carry_forward_losses
            && self.lots == other.lots
            && self.yearly_breakdown == other.yearly_breakdown
    }

    pub fn display_year(&self) -> String {
        self.residency.display_year(self.tax_year)
    }
}
