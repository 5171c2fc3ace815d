//! History command - stored results for a tax year

use super::Target;
use crate::utils::{format_money, format_rate};
use clap::Args;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(flatten)]
    target: Target,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Calculated")]
    calculated_at: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Gains")]
    gains: String,
    #[tabled(rename = "Losses")]
    losses: String,
    #[tabled(rename = "Taxable")]
    taxable: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Carried")]
    carried: String,
}

impl HistoryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let results = self
            .target
            .calculator()
            .history(&self.target.user, self.target.year)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!(
                "No stored results for {} in tax year {}",
                self.target.user, self.target.year
            );
            return Ok(());
        }

        let rows: Vec<HistoryRow> = results
            .iter()
            .map(|r| HistoryRow {
                calculated_at: r.calculated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                id: r.id.to_string(),
                method: r.method.to_string(),
                gains: format_money(r.total_gains, r.residency),
                losses: format_money(r.total_losses, r.residency),
                taxable: format_money(r.taxable_income, r.residency),
                rate: format_rate(r.rate),
                tax: format_money(r.tax_owed, r.residency),
                carried: format_money(r.carry_forward_losses, r.residency),
            })
            .collect();

        println!();
        println!(
            "RESULT HISTORY ({}, {})",
            results[0].display_year(),
            self.target.user
        );
        println!();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        Ok(())
    }
}
