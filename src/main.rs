use clap::{Parser, Subcommand};

mod cmd;
mod utils;

/// Tax lot accounting: realised gains, loss offset and carryforward
#[derive(Parser, Debug)]
#[command(name = "taxlot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate the tax liability for a year and store the result
    Calculate(cmd::calculate::CalculateCommand),
    /// Show the lots realised in a year
    Lots(cmd::lots::LotsCommand),
    /// Show stored results for a year
    History(cmd::history::HistoryCommand),
    /// Print the expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    match Cli::parse().command {
        Command::Calculate(calculate) => calculate.exec(),
        Command::Lots(lots) => lots.exec(),
        Command::History(history) => history.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
