use rust_decimal::Decimal;
use taxlot::core::Residency;

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn currency_symbol(residency: Residency) -> &'static str {
    match residency {
        Residency::Uk => "£",
        Residency::Us => "$",
        Residency::De => "€",
    }
}

pub fn format_money(amount: Decimal, residency: Residency) -> String {
    let symbol = currency_symbol(residency);
    if amount < Decimal::ZERO {
        format!("-{}{:.2}", symbol, amount.abs())
    } else {
        format!("{}{:.2}", symbol, amount)
    }
}

pub fn format_quantity(qty: Decimal) -> String {
    // Up to 8 places, trailing zeros removed
    let s = format!("{:.8}", qty);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_is_signed_with_residency_symbol() {
        assert_eq!(format_money(dec!(1234.5), Residency::Uk), "£1234.50");
        assert_eq!(format_money(dec!(-20), Residency::Us), "-$20.00");
    }

    #[test]
    fn quantity_trims_trailing_zeros() {
        assert_eq!(format_quantity(dec!(0.50000000)), "0.5");
        assert_eq!(format_quantity(dec!(3)), "3");
    }

    #[test]
    fn rate_as_percentage() {
        assert_eq!(format_rate(dec!(0.26375)), "26.375%");
        assert_eq!(format_rate(dec!(0.20)), "20%");
    }
}
