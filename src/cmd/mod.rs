pub mod calculate;
pub mod history;
pub mod lots;
pub mod schema;

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use taxlot::core::{AccountingMethod, TaxYear};
use taxlot::store::FileStore;
use taxlot::tax::Calculator;

/// Location of the data directory and the user and year to report on
#[derive(Args, Debug)]
pub struct Target {
    /// Data directory holding settings.json, trades/ and results.jsonl
    #[arg(short, long, default_value = ".")]
    data: PathBuf,

    /// User whose ledger to process
    #[arg(short, long)]
    user: String,

    /// Tax year (e.g., 2025 or 2024/25 for the UK year ending April 2025)
    #[arg(short, long)]
    year: TaxYear,
}

impl Target {
    fn calculator(&self) -> Calculator {
        let store = Arc::new(FileStore::new(&self.data));
        Calculator::new(store.clone(), store.clone(), store)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Fifo,
    Lifo,
}

impl From<MethodArg> for AccountingMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Fifo => AccountingMethod::Fifo,
            MethodArg::Lifo => AccountingMethod::Lifo,
        }
    }
}
