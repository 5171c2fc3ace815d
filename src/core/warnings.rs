use super::residency::TaxYear;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Non-fatal conditions reported alongside a calculation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// No rate for the requested year; the latest known rate was used.
    RateTableGap {
        requested: TaxYear,
        used: TaxYear,
        #[schemars(with = "f64")]
        rate: Decimal,
    },
    /// Sell without an exit time; its entry time was used as the disposal date.
    MissingExitTime { trade_id: String },
}

impl Warning {
    pub fn message(&self) -> String {
        match self {
            Warning::RateTableGap {
                requested,
                used,
                rate,
            } => format!(
                "no rate for tax year {requested}; used {used} rate of {}%",
                rate * Decimal::ONE_HUNDRED
            ),
            Warning::MissingExitTime { trade_id } => {
                format!("sell {trade_id} has no exit time; entry time used")
            }
        }
    }
}
