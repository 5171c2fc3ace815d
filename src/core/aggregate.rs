use super::lot::TaxLot;
use super::residency::{Residency, TaxYear};
use regex::Regex;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Six letters and nothing else, e.g. EURUSD
static FOREX_PAIR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{6}$").expect("Invalid regex pattern"));

/// Quote currency suffix, e.g. BTC-EUR, ETH/JPY, SAP_EUR
static CURRENCY_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-/_](USD|EUR|GBP|JPY|CHF|CAD|AUD|NZD|HKD|SGD|SEK|NOK|DKK|CNY|INR)$")
        .expect("Invalid regex pattern")
});

/// Heuristic foreign-asset check on the shape of a symbol.
///
/// A symbol is foreign when it carries an exchange suffix (`VOD.L`), is quoted
/// in a currency other than `local_currency` (`BTC-EUR` for a GBP resident),
/// or looks like a forex pair (`EURUSD`). This is a stand-in for a lookup
/// against instrument metadata.
pub fn is_foreign_symbol(symbol: &str, local_currency: &str) -> bool {
    let symbol = symbol.trim().to_uppercase();
    if symbol.contains('.') {
        return true;
    }
    if let Some(caps) = CURRENCY_SUFFIX_REGEX.captures(&symbol) {
        if !caps[1].eq_ignore_ascii_case(local_currency) {
            return true;
        }
    }
    FOREX_PAIR_REGEX.is_match(&symbol)
}

/// Totals realised within one tax year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearBreakdown {
    #[schemars(with = "f64")]
    pub total_gains: Decimal,
    #[schemars(with = "f64")]
    pub total_losses: Decimal,
    #[schemars(with = "f64")]
    pub fees_paid: Decimal,
    #[schemars(with = "f64")]
    pub foreign_income: Decimal,
    #[schemars(with = "f64")]
    pub foreign_tax_paid: Decimal,
    /// Lots with at least one disposal in the year
    pub lots_realized: usize,
}

impl YearBreakdown {
    pub fn net_income(&self) -> Decimal {
        self.total_gains - self.total_losses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub include_fees: bool,
    pub include_foreign_tax: bool,
}

/// Output of aggregation for a requested tax year
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Totals for the requested year
    pub totals: YearBreakdown,
    /// Totals for every year with a disposal
    pub yearly: BTreeMap<TaxYear, YearBreakdown>,
    /// Lots realised in the requested year
    pub contributing: Vec<TaxLot>,
}

#[derive(Default)]
struct LotYear {
    proceeds: Decimal,
    cost: Decimal,
    fees: Decimal,
    foreign_tax: Decimal,
}

/// Accumulate realised gains and losses per tax year.
///
/// Each lot's disposal slices are grouped by the tax year of the sale; per lot
/// and year, `proceeds - cost` is a gain when positive and a loss otherwise.
/// Fees are totalled but never change the gain.
pub fn aggregate(
    lots: &[TaxLot],
    tax_year: TaxYear,
    residency: Residency,
    options: AggregateOptions,
) -> Aggregate {
    let mut yearly: BTreeMap<TaxYear, YearBreakdown> = BTreeMap::new();
    let mut contributing = Vec::new();

    for lot in lots {
        let mut per_year: BTreeMap<TaxYear, LotYear> = BTreeMap::new();
        for disposal in &lot.disposals {
            let entry = per_year.entry(disposal.tax_year).or_default();
            entry.proceeds += disposal.proceeds;
            entry.cost += disposal.cost;
            entry.fees += disposal.fees;
            entry.foreign_tax += disposal.foreign_tax;
        }
        if per_year.is_empty() {
            continue;
        }

        let foreign = options.include_foreign_tax
            && is_foreign_symbol(&lot.symbol, residency.local_currency());

        for (year, realised) in per_year {
            let bucket = yearly.entry(year).or_default();
            let gain = realised.proceeds - realised.cost;
            if gain > Decimal::ZERO {
                bucket.total_gains += gain;
            } else {
                bucket.total_losses += gain.abs();
            }
            if options.include_fees {
                bucket.fees_paid += realised.fees;
            }
            if foreign {
                bucket.foreign_income += gain.max(Decimal::ZERO);
                bucket.foreign_tax_paid += realised.foreign_tax;
            }
            bucket.lots_realized += 1;

            if year == tax_year {
                contributing.push(lot.clone());
            }
        }
    }

    log::debug!(
        "Aggregated {} lots into {} tax years",
        lots.len(),
        yearly.len()
    );

    Aggregate {
        totals: yearly.get(&tax_year).cloned().unwrap_or_default(),
        yearly,
        contributing,
    }
}
