use super::error::{Result, TaxError};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A tax year, labelled by the calendar year in which it ends
/// (e.g. 2025 is the UK 2024/25 year, or the US/DE calendar year 2025).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct TaxYear(pub i32);

impl TaxYear {
    pub fn previous(self) -> TaxYear {
        TaxYear(self.0 - 1)
    }
}

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxYear {
    type Err = String;

    /// Accepts "2025" or the split form "2024/25"
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once('/') {
            let start: i32 = start.parse().map_err(|_| format!("invalid tax year: {s}"))?;
            let end: i32 = end.parse().map_err(|_| format!("invalid tax year: {s}"))?;
            if (start + 1) % 100 != end % 100 {
                return Err(format!("tax year halves are not consecutive: {s}"));
            }
            return Ok(TaxYear(start + 1));
        }
        s.parse()
            .map(TaxYear)
            .map_err(|_| format!("invalid tax year: {s}"))
    }
}

/// Tax residencies with an implemented rules module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Residency {
    /// United Kingdom - tax year runs 6 April to 5 April
    Uk,
    /// United States - calendar year
    Us,
    /// Germany - calendar year, flat Abgeltungssteuer
    De,
}

impl Residency {
    /// Resolve a stored residency code to its rules module
    pub fn resolve(code: &str) -> Result<Self> {
        match code.trim().to_uppercase().as_str() {
            "UK" | "GB" | "GBR" | "UNITED KINGDOM" => Ok(Residency::Uk),
            "US" | "USA" | "UNITED STATES" => Ok(Residency::Us),
            "DE" | "DEU" | "GERMANY" => Ok(Residency::De),
            _ => Err(TaxError::UnsupportedResidency(code.to_string())),
        }
    }

    pub fn local_currency(&self) -> &'static str {
        match self {
            Residency::Uk => "GBP",
            Residency::Us => "USD",
            Residency::De => "EUR",
        }
    }

    /// Tax year containing the given date
    pub fn tax_year(&self, date: NaiveDate) -> TaxYear {
        match self {
            Residency::Uk => {
                // 6 April onwards belongs to the year ending next April
                if (date.month(), date.day()) >= (4, 6) {
                    TaxYear(date.year() + 1)
                } else {
                    TaxYear(date.year())
                }
            }
            Residency::Us | Residency::De => TaxYear(date.year()),
        }
    }

    /// First day of the tax year
    pub fn start_date(&self, year: TaxYear) -> NaiveDate {
        match self {
            Residency::Uk => ymd(year.0 - 1, 4, 6),
            Residency::Us | Residency::De => ymd(year.0, 1, 1),
        }
    }

    /// Last day of the tax year
    pub fn end_date(&self, year: TaxYear) -> NaiveDate {
        match self {
            Residency::Uk => ymd(year.0, 4, 5),
            Residency::Us | Residency::De => ymd(year.0, 12, 31),
        }
    }

    /// Human label, e.g. "2024/25" for the UK
    pub fn display_year(&self, year: TaxYear) -> String {
        match self {
            Residency::Uk => format!("{}/{:02}", year.0 - 1, year.0 % 100),
            Residency::Us | Residency::De => year.to_string(),
        }
    }

    /// Capital gains rate table for this residency
    pub fn rate_table(&self) -> RateTable {
        match self {
            // Higher rate on crypto and residential property. 24% applies to disposals from
            // 30 Oct 2024, part way through 2024/25; one rate per year keeps 20% for all of
            // 2024/25 and starts 24% with 2025/26.
            Residency::Uk => RateTable::from_iter([
                (TaxYear(2020), dec!(0.20)),
                (TaxYear(2021), dec!(0.20)),
                (TaxYear(2022), dec!(0.20)),
                (TaxYear(2023), dec!(0.20)),
                (TaxYear(2024), dec!(0.20)),
                (TaxYear(2025), dec!(0.20)),
                (TaxYear(2026), dec!(0.24)),
            ]),
            // Top long-term rate
            Residency::Us => RateTable::from_iter([
                (TaxYear(2020), dec!(0.20)),
                (TaxYear(2021), dec!(0.20)),
                (TaxYear(2022), dec!(0.20)),
                (TaxYear(2023), dec!(0.20)),
                (TaxYear(2024), dec!(0.20)),
                (TaxYear(2025), dec!(0.20)),
            ]),
            // 25% + solidarity surcharge
            Residency::De => RateTable::from_iter([
                (TaxYear(2021), dec!(0.26375)),
                (TaxYear(2022), dec!(0.26375)),
                (TaxYear(2023), dec!(0.26375)),
                (TaxYear(2024), dec!(0.26375)),
                (TaxYear(2025), dec!(0.26375)),
            ]),
        }
    }
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residency::Uk => write!(f, "United Kingdom"),
            Residency::Us => write!(f, "United States"),
            Residency::De => write!(f, "Germany"),
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Rate looked up for a tax year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLookup {
    pub rate: Decimal,
    /// Year whose rate was used; differs from the requested year on a gap
    pub year: TaxYear,
}

impl RateLookup {
    pub fn is_fallback(&self, requested: TaxYear) -> bool {
        self.year != requested
    }
}

/// Flat capital gains rate per tax year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    rates: BTreeMap<TaxYear, Decimal>,
}

impl RateTable {
    /// Rate for the year, or the latest known rate when the year is missing.
    /// Returns `None` only for an empty table.
    pub fn lookup(&self, year: TaxYear) -> Option<RateLookup> {
        if let Some(rate) = self.rates.get(&year) {
            return Some(RateLookup { rate: *rate, year });
        }
        self.rates
            .iter()
            .next_back()
            .map(|(y, rate)| RateLookup { rate: *rate, year: *y })
    }

    pub fn insert(&mut self, year: TaxYear, rate: Decimal) {
        self.rates.insert(year, rate);
    }
}

impl FromIterator<(TaxYear, Decimal)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (TaxYear, Decimal)>>(iter: I) -> Self {
        RateTable {
            rates: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn uk_tax_year_boundaries() {
        assert_eq!(Residency::Uk.tax_year(date("2024-04-05")), TaxYear(2024));
        assert_eq!(Residency::Uk.tax_year(date("2024-04-06")), TaxYear(2025));
        assert_eq!(Residency::Uk.tax_year(date("2024-12-31")), TaxYear(2025));
        assert_eq!(Residency::Uk.tax_year(date("2025-01-15")), TaxYear(2025));
    }

    #[test]
    fn calendar_tax_years() {
        assert_eq!(Residency::Us.tax_year(date("2024-12-31")), TaxYear(2024));
        assert_eq!(Residency::De.tax_year(date("2025-01-01")), TaxYear(2025));
    }

    #[test]
    fn start_and_end_dates() {
        assert_eq!(Residency::Uk.start_date(TaxYear(2025)), date("2024-04-06"));
        assert_eq!(Residency::Uk.end_date(TaxYear(2025)), date("2025-04-05"));
        assert_eq!(Residency::Us.start_date(TaxYear(2025)), date("2025-01-01"));
        assert_eq!(Residency::Us.end_date(TaxYear(2025)), date("2025-12-31"));
    }

    #[test]
    fn display_year() {
        assert_eq!(Residency::Uk.display_year(TaxYear(2025)), "2024/25");
        assert_eq!(Residency::Uk.display_year(TaxYear(2001)), "2000/01");
        assert_eq!(Residency::De.display_year(TaxYear(2025)), "2025");
    }

    #[test]
    fn parse_tax_year() {
        assert_eq!("2025".parse::<TaxYear>(), Ok(TaxYear(2025)));
        assert_eq!("2024/25".parse::<TaxYear>(), Ok(TaxYear(2025)));
        assert!("2024/26".parse::<TaxYear>().is_err());
        assert!("twenty".parse::<TaxYear>().is_err());
    }

    #[test]
    fn resolve_residency_codes() {
        assert_eq!(Residency::resolve("uk").unwrap(), Residency::Uk);
        assert_eq!(Residency::resolve("GB").unwrap(), Residency::Uk);
        assert_eq!(Residency::resolve("usa").unwrap(), Residency::Us);
        assert_eq!(Residency::resolve("Germany").unwrap(), Residency::De);
        assert!(matches!(
            Residency::resolve("FR"),
            Err(TaxError::UnsupportedResidency(code)) if code == "FR"
        ));
    }

    #[test]
    fn rate_lookup_exact_year() {
        let lookup = Residency::Uk.rate_table().lookup(TaxYear(2026)).unwrap();
        assert_eq!(lookup.rate, dec!(0.24));
        assert!(!lookup.is_fallback(TaxYear(2026)));
    }

    #[test]
    fn uk_higher_rate_starts_with_2025_26() {
        let table = Residency::Uk.rate_table();
        // 2024/25 straddles the 30 Oct 2024 change and keeps the earlier rate
        assert_eq!(table.lookup(TaxYear(2025)).unwrap().rate, dec!(0.20));
        assert_eq!(Residency::Uk.display_year(TaxYear(2026)), "2025/26");
        assert_eq!(table.lookup(TaxYear(2026)).unwrap().rate, dec!(0.24));
    }

    #[test]
    fn rate_lookup_falls_back_to_latest() {
        let table = Residency::Uk.rate_table();
        let future = table.lookup(TaxYear(2030)).unwrap();
        assert_eq!(future.rate, dec!(0.24));
        assert_eq!(future.year, TaxYear(2026));
        assert!(future.is_fallback(TaxYear(2030)));

        // Years before the table also use the latest known rate
        let past = table.lookup(TaxYear(2010)).unwrap();
        assert_eq!(past.year, TaxYear(2026));
    }

    #[test]
    fn empty_rate_table_has_no_rate() {
        assert!(RateTable::default().lookup(TaxYear(2025)).is_none());
    }
}
