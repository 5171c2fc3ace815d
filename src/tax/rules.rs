use crate::core::{RateLookup, RateTable, TaxYear, Warning};
use rust_decimal::Decimal;

/// Inputs to the loss offset and carryforward rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesInput {
    pub total_gains: Decimal,
    pub total_losses: Decimal,
    pub previous_year_losses: Decimal,
    pub offset_losses: bool,
    pub carry_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesOutcome {
    pub net_income: Decimal,
    pub taxable_income: Decimal,
    pub tax_owed: Decimal,
    pub carry_forward_losses: Decimal,
    /// Prior-year losses actually brought into the offset
    pub previous_year_losses: Decimal,
    pub rate: Decimal,
    pub warning: Option<Warning>,
}

/// Apply loss offset, carryforward and the year's flat rate.
///
/// With offsetting enabled, this year's losses plus (when carrying forward)
/// last year's unused losses are set against gross gains; whatever is not
/// absorbed carries to next year. Without offsetting, all gains are taxable
/// and this year's losses carry forward untouched.
pub fn apply_rules(input: RulesInput, rate_table: &RateTable, tax_year: TaxYear) -> RulesOutcome {
    let net_income = input.total_gains - input.total_losses;
    let previous_year_losses = if input.carry_forward {
        input.previous_year_losses.max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let (taxable_income, carry_forward_losses) = if input.offset_losses {
        let available = input.total_losses + previous_year_losses;
        (
            (input.total_gains - available).max(Decimal::ZERO),
            (available - input.total_gains).max(Decimal::ZERO),
        )
    } else {
        (input.total_gains, input.total_losses)
    };

    let (rate, warning) = match rate_table.lookup(tax_year) {
        Some(lookup) if lookup.is_fallback(tax_year) => {
            log::warn!(
                "No rate for tax year {}, using {} rate {}",
                tax_year,
                lookup.year,
                lookup.rate
            );
            (lookup.rate, Some(gap_warning(tax_year, lookup)))
        }
        Some(lookup) => (lookup.rate, None),
        None => {
            log::warn!("Rate table is empty, tax year {} taxed at zero", tax_year);
            let lookup = RateLookup {
                rate: Decimal::ZERO,
                year: tax_year,
            };
            (lookup.rate, Some(gap_warning(tax_year, lookup)))
        }
    };

    RulesOutcome {
        net_income,
        taxable_income,
        tax_owed: (taxable_income * rate).round_dp(2),
        carry_forward_losses,
        previous_year_losses,
        rate,
        warning,
    }
}

fn gap_warning(requested: TaxYear, lookup: RateLookup) -> Warning {
    Warning::RateTableGap {
        requested,
        used: lookup.year,
        rate: lookup.rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        RateTable::from_iter([(TaxYear(2024), dec!(0.20)), (TaxYear(2025), dec!(0.25))])
    }

    fn input(gains: Decimal, losses: Decimal, previous: Decimal) -> RulesInput {
        RulesInput {
            total_gains: gains,
            total_losses: losses,
            previous_year_losses: previous,
            offset_losses: true,
            carry_forward: true,
        }
    }

    #[test]
    fn losses_exceeding_gains_carry_forward() {
        let outcome = apply_rules(
            RulesInput {
                carry_forward: false,
                ..input(dec!(1000), dec!(1500), Decimal::ZERO)
            },
            &table(),
            TaxYear(2024),
        );

        assert_eq!(outcome.net_income, dec!(-500));
        assert_eq!(outcome.taxable_income, Decimal::ZERO);
        assert_eq!(outcome.carry_forward_losses, dec!(500));
        assert_eq!(outcome.tax_owed, Decimal::ZERO);
    }

    #[test]
    fn carryforward_absorbs_net_income() {
        let outcome = apply_rules(
            input(dec!(500), Decimal::ZERO, dec!(500)),
            &table(),
            TaxYear(2024),
        );

        assert_eq!(outcome.net_income, dec!(500));
        assert_eq!(outcome.taxable_income, Decimal::ZERO);
        assert_eq!(outcome.carry_forward_losses, Decimal::ZERO);
        assert_eq!(outcome.previous_year_losses, dec!(500));
    }

    #[test]
    fn partial_offset_taxes_the_remainder() {
        let outcome = apply_rules(
            input(dec!(10000), dec!(2000), dec!(1000)),
            &table(),
            TaxYear(2024),
        );

        assert_eq!(outcome.taxable_income, dec!(7000));
        assert_eq!(outcome.carry_forward_losses, Decimal::ZERO);
        assert_eq!(outcome.tax_owed, dec!(1400));
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn previous_losses_ignored_without_carryforward() {
        let outcome = apply_rules(
            RulesInput {
                carry_forward: false,
                ..input(dec!(1000), Decimal::ZERO, dec!(800))
            },
            &table(),
            TaxYear(2025),
        );

        assert_eq!(outcome.taxable_income, dec!(1000));
        assert_eq!(outcome.previous_year_losses, Decimal::ZERO);
        assert_eq!(outcome.tax_owed, dec!(250));
    }

    #[test]
    fn no_offset_taxes_all_gains() {
        let outcome = apply_rules(
            RulesInput {
                offset_losses: false,
                ..input(dec!(1000), dec!(400), dec!(300))
            },
            &table(),
            TaxYear(2024),
        );

        assert_eq!(outcome.net_income, dec!(600));
        assert_eq!(outcome.taxable_income, dec!(1000));
        assert_eq!(outcome.carry_forward_losses, dec!(400));
        assert_eq!(outcome.tax_owed, dec!(200));
    }

    #[test]
    fn missing_year_uses_latest_rate_with_warning() {
        let outcome = apply_rules(
            input(dec!(100), Decimal::ZERO, Decimal::ZERO),
            &table(),
            TaxYear(2030),
        );

        assert_eq!(outcome.rate, dec!(0.25));
        assert_eq!(outcome.tax_owed, dec!(25));
        assert_eq!(
            outcome.warning,
            Some(Warning::RateTableGap {
                requested: TaxYear(2030),
                used: TaxYear(2025),
                rate: dec!(0.25),
            })
        );
    }

    #[test]
    fn tax_owed_rounded_to_pennies() {
        let table = RateTable::from_iter([(TaxYear(2024), dec!(0.26375))]);
        let outcome = apply_rules(
            input(dec!(1234.56), Decimal::ZERO, Decimal::ZERO),
            &table,
            TaxYear(2024),
        );

        assert_eq!(outcome.tax_owed, dec!(325.62));
    }
}
