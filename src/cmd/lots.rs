//! Lots command - lots realised in a tax year

use super::{MethodArg, Target};
use crate::utils::{format_money, format_quantity, write_csv};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxlot::core::{LotStatus, Residency, TaxLot};
use taxlot::tax::TaxOptions;

#[derive(Args, Debug)]
pub struct LotsCommand {
    #[command(flatten)]
    target: Target,

    /// Lot matching method, overriding the stored setting
    #[arg(short, long, value_enum)]
    method: Option<MethodArg>,

    /// Filter by symbol (e.g., BTC, AAPL)
    #[arg(short, long)]
    symbol: Option<String>,

    /// Output as JSON instead of formatted table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output as CSV
    #[arg(long)]
    csv: bool,
}

#[derive(Tabled)]
struct LotRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "Trade")]
    trade_id: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Disposed")]
    disposed: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Gain")]
    gain: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Flat record for CSV output
#[derive(Serialize)]
struct LotRecord<'a> {
    lot: usize,
    trade_id: &'a str,
    symbol: &'a str,
    acquired_at: String,
    disposed_at: Option<String>,
    original_quantity: Decimal,
    quantity: Decimal,
    cost_basis: Decimal,
    released_cost: Decimal,
    proceeds: Decimal,
    fees_paid: Decimal,
    foreign_tax_paid: Decimal,
    gain: Decimal,
    status: LotStatus,
}

impl LotsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let overrides = TaxOptions {
            method: self.method.map(Into::into),
            ..TaxOptions::default()
        };
        let result = self
            .target
            .calculator()
            .preview(&self.target.user, self.target.year, &overrides)?;

        let lots: Vec<&TaxLot> = result
            .lots
            .iter()
            .filter(|lot| {
                self.symbol
                    .as_deref()
                    .is_none_or(|s| lot.symbol.eq_ignore_ascii_case(s))
            })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&lots)?);
        } else if self.csv {
            write_csv(lots.iter().map(|lot| lot_record(lot)), io::stdout())?;
        } else {
            print_lots(&lots, result.residency, &result.display_year());
        }
        Ok(())
    }
}

fn lot_record(lot: &TaxLot) -> LotRecord<'_> {
    LotRecord {
        lot: lot.id,
        trade_id: &lot.trade_id,
        symbol: &lot.symbol,
        acquired_at: lot.acquired_at.to_rfc3339(),
        disposed_at: lot.disposed_at.map(|d| d.to_rfc3339()),
        original_quantity: lot.original_quantity,
        quantity: lot.quantity,
        cost_basis: lot.cost_basis,
        released_cost: lot.released_cost(),
        proceeds: lot.proceeds,
        fees_paid: lot.fees_paid,
        foreign_tax_paid: lot.foreign_tax_paid,
        gain: lot.realized_gain(),
        status: lot.status,
    }
}

fn print_lots(lots: &[&TaxLot], residency: Residency, year: &str) {
    if lots.is_empty() {
        println!("No lots realised in {}", year);
        return;
    }

    let rows: Vec<LotRow> = lots
        .iter()
        .map(|lot| LotRow {
            id: lot.id,
            trade_id: lot.trade_id.clone(),
            symbol: lot.symbol.clone(),
            acquired: lot.acquired_at.format("%Y-%m-%d").to_string(),
            disposed: lot
                .disposed_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            quantity: format_quantity(lot.original_quantity),
            remaining: format_quantity(lot.quantity),
            cost: format_money(lot.released_cost(), residency),
            proceeds: format_money(lot.proceeds, residency),
            gain: format_money(lot.realized_gain(), residency),
            status: format!("{:?}", lot.status),
        })
        .collect();

    println!();
    println!("LOTS REALISED ({})", year);
    println!();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}
