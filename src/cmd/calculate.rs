//! Calculate command - compute and store the liability for a tax year

use super::{MethodArg, Target};
use crate::utils::{format_money, format_rate};
use clap::Args;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxlot::tax::{TaxCalculationResult, TaxOptions};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    #[command(flatten)]
    target: Target,

    /// Lot matching method, overriding the stored setting
    #[arg(short, long, value_enum)]
    method: Option<MethodArg>,

    /// Total fees on realised lots
    #[arg(long)]
    fees: Option<bool>,

    /// Report foreign income and foreign tax paid
    #[arg(long)]
    foreign_tax: Option<bool>,

    /// Offset losses against gains
    #[arg(long)]
    offset: Option<bool>,

    /// Bring unused losses from the previous year
    #[arg(long)]
    carry_forward: Option<bool>,

    /// Losses brought forward, instead of the previous year's stored result
    #[arg(long)]
    previous_losses: Option<Decimal>,

    /// Compute without storing the result
    #[arg(long)]
    dry_run: bool,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct YearRow {
    #[tabled(rename = "Tax Year")]
    tax_year: String,
    #[tabled(rename = "Gains")]
    gains: String,
    #[tabled(rename = "Losses")]
    losses: String,
    #[tabled(rename = "Net")]
    net: String,
    #[tabled(rename = "Fees")]
    fees: String,
    #[tabled(rename = "Lots")]
    lots: usize,
}

impl CalculateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let overrides = TaxOptions {
            residency: None,
            method: self.method.map(Into::into),
            include_fees: self.fees,
            include_foreign_tax: self.foreign_tax,
            offset_losses: self.offset,
            carry_forward: self.carry_forward,
            previous_year_losses: self.previous_losses,
        };
        let calculator = self.target.calculator();
        let result = if self.dry_run {
            calculator.preview(&self.target.user, self.target.year, &overrides)?
        } else {
            calculator.calculate(&self.target.user, self.target.year, &overrides)?
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            self.print_summary(&result);
        }
        Ok(())
    }

    fn print_summary(&self, result: &TaxCalculationResult) {
        let money = |amount| format_money(amount, result.residency);

        println!();
        println!(
            "TAX CALCULATION ({}, {:?}, {}) - {}",
            result.display_year(),
            result.residency,
            result.method,
            result.user_id
        );
        println!();
        println!("  Lots realised:   {}", result.lots.len());
        println!(
            "  Gains: {} | Losses: {} | Net: {}",
            money(result.total_gains),
            money(result.total_losses),
            money(result.net_income)
        );
        println!(
            "  Brought forward: {} | Carried forward: {}",
            money(result.previous_year_losses),
            money(result.carry_forward_losses)
        );
        println!(
            "  Taxable: {} | Tax @ {}: {}",
            money(result.taxable_income),
            format_rate(result.rate),
            money(result.tax_owed)
        );
        println!(
            "  Fees: {} | Foreign income: {} | Foreign tax paid: {}",
            money(result.fees_paid),
            money(result.foreign_income),
            money(result.foreign_tax_paid)
        );

        if result.yearly_breakdown.len() > 1 {
            let rows: Vec<YearRow> = result
                .yearly_breakdown
                .iter()
                .map(|(year, b)| YearRow {
                    tax_year: result.residency.display_year(*year),
                    gains: money(b.total_gains),
                    losses: money(b.total_losses),
                    net: money(b.net_income()),
                    fees: money(b.fees_paid),
                    lots: b.lots_realized,
                })
                .collect();
            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                .to_string();
            println!();
            println!("{}", table);
        }

        for warning in &result.warnings {
            println!("  Warning: {}", warning.message());
        }
        println!();
        if self.dry_run {
            println!("Dry run: result not stored");
        } else {
            println!("Stored as {}", result.id);
        }
    }
}
