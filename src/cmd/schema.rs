//! Schema command - print expected input and output formats

use clap::Args;
use schemars::schema_for;
use taxlot::core::trade::CSV_COLUMNS;
use taxlot::core::LedgerInput;
use taxlot::tax::{TaxCalculationResult, TaxSettings};

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for a trade ledger
    JsonSchema,
    /// JSON Schema for an entry in settings.json
    Settings,
    /// JSON Schema for a stored calculation result
    Result,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(LedgerInput))?)
            }
            SchemaFormat::Settings => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(TaxSettings))?)
            }
            SchemaFormat::Result => println!(
                "{}",
                serde_json::to_string_pretty(&schema_for!(TaxCalculationResult))?
            ),
            SchemaFormat::CsvHeader => println!("{}", CSV_COLUMNS.join(",")),
            SchemaFormat::CsvFields => print_csv_fields(),
        }
        Ok(())
    }
}

fn print_csv_fields() {
    println!("CSV Ledger Format");
    println!("=================");
    println!();
    for (name, required, description) in CSV_FIELD_DESCRIPTIONS {
        let req = if *required { "required" } else { "optional" };
        println!("{:22} ({:8})  {}", name, req, description);
    }
    println!();
    println!("Rows may appear in any order; they are sorted by entry_time on read.");
}

const CSV_FIELD_DESCRIPTIONS: &[(&str, bool, &str)] = &[
    ("id", true, "Unique trade identifier"),
    ("symbol", true, "Instrument symbol (e.g., BTC, VOD.L, EURUSD)"),
    ("side", true, "buy or sell"),
    ("quantity", true, "Units traded, positive"),
    ("price", true, "Price per unit in the local currency"),
    (
        "entry_time",
        true,
        "RFC3339 timestamp, or YYYY-MM-DD (UTC midnight)",
    ),
    (
        "exit_time",
        false,
        "Settlement time of a sell; entry_time is used when empty",
    ),
    ("fees", false, "Commission paid on the trade"),
    ("foreign_tax_withheld", false, "Tax withheld abroad"),
    ("asset_class", false, "Crypto, Stock (default) or Forex"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_csv_column_is_described() {
        let described: Vec<&str> = CSV_FIELD_DESCRIPTIONS.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(described, CSV_COLUMNS);
    }
}
