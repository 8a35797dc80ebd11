#![forbid(unsafe_code)]

use error_iter::ErrorIter as _;
use is_terminal::IsTerminal as _;
use lotledger::basis::{Ledger, LedgerConfig, MiningValuation};
use lotledger::errors::{CheckpointError, ExchangeRatesDbError, ImportError, LedgerError};
use lotledger::imports::{address::read_address_book, transactions::read_transactions};
use lotledger::model::{constants, AddressBook, ExchangeRates, FixedPrices, LotsCheckpoint};
use lotledger::model::{GainsWorksheet, IncomeWorksheet, LotsWorksheet, PriceOracle};
use lotledger::model::{Stats, Sums, Symbol};
use lotledger::util::year_ext::CheckYearsExt as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use std::fmt::Display;
use std::path::PathBuf;
use std::{env, process::ExitCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - RUST_LOG accepts tracing filter directives, e.g. `debug` or `lotledger=trace`"]
#[footer = "      default is \"info\""]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read transactions CSV from a file.
    ///   Rows from all files are applied in timestamp order.
    ///
    #[long]
    input_tx: Vec<PathBuf>,

    /// Read withdrawal addresses CSV from a file.
    #[long]
    input_addresses: Vec<PathBuf>,

    /// Exchange Rates database directory.
    ///   Fixed prices are used when this is not provided.
    ///
    #[long]
    exchange_rates_db: Option<PathBuf>,

    /// Reporting year.
    ///   Disposals without lots are dated January 1 of this year.
    ///   Default is the first year found in the input.
    ///
    #[short('y')]
    year: Option<i32>,

    /// Fiat currency that basis is tracked in.
    #[long]
    #[default("USD")]
    fiat: String,

    /// Value mined coins as `quantity + price` for reconciling old reports.
    #[long]
    legacy_mining_valuation: bool,

    /// Read checkpoint from a file.
    #[long]
    input_checkpoint: Option<PathBuf>,

    /// Write checkpoint to a file.
    ///
    #[long]
    output_checkpoint: Option<PathBuf>,

    /// Write worksheet CSVs to this output directory.
    #[short('o')]
    worksheet_path: Option<PathBuf>,

    /// Worksheet CSVs written to an output directory will be given
    ///   this prefix.
    #[short('p')]
    #[default("")]
    worksheet_prefix: String,

    /// Enable verbose output.
    /// Prints open lots and import statistics to stdout when not written to a file.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to import {0:?}")]
    Import(PathBuf, #[source] ImportError),

    #[error("Unable to parse Addresses CSV: {0:?}")]
    Address(PathBuf, #[source] ImportError),

    #[error("Ledger error")]
    Ledger(#[from] LedgerError),

    #[error("Unable to load ExchangeRates DataBase")]
    ExchangeRatesDb(#[from] ExchangeRatesDbError),

    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint error, unable to read {0:?}")]
    InputCheckpoint(PathBuf, #[source] Box<CheckpointError>),

    #[error("Checkpoint error, unable to write {0:?}")]
    OutputCheckpoint(PathBuf, #[source] Box<CheckpointError>),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;
    let mut stats = Stats::default();

    let mut transactions = Vec::new();
    for path in &args.input_tx {
        transactions.extend(
            read_transactions(&mut stats, path).map_err(|err| Error::Import(path.clone(), err))?,
        );
    }
    // Stable, so rows with equal timestamps keep their file order.
    transactions.sort_by_key(|tx| tx.timestamp);

    let mut addresses = AddressBook::new();
    for path in &args.input_addresses {
        read_address_book(&mut stats, &mut addresses, path)
            .map_err(|err| Error::Address(path.clone(), err))?;
    }

    // Load open lots from checkpoint if a path is provided.
    let checkpoint = match args.input_checkpoint.as_ref() {
        Some(path) => {
            debug!("Loading checkpoint from {path:?}");

            LotsCheckpoint::load(path)
                .map_err(|err| Error::InputCheckpoint(path.clone(), Box::new(err)))?
        }
        None => LotsCheckpoint::default(),
    };
    let checkpoint_time = checkpoint.header().latest_row_time;
    if let Some(latest) = checkpoint_time {
        let stale = transactions.iter().filter(|tx| tx.timestamp <= latest).count();
        if stale > 0 {
            warn!("{stale} transactions are not newer than the checkpoint at {latest}");
        }
    }

    // Get the first available year in the input data, and check that all rows agree.
    let year = args
        .year
        .or_else(|| transactions.get_first_year())
        .unwrap_or(constants::DEFAULT_YEAR);
    if let Err(years) = transactions.check_years(year) {
        warn!("Input data has multiple years: Expected {year}, found {years:?}");
    }

    let config = LedgerConfig {
        year,
        fiat: Symbol::new(&args.fiat),
        mining_valuation: if args.legacy_mining_valuation {
            MiningValuation::LegacySum
        } else {
            MiningValuation::Product
        },
    };
    let prices: Box<dyn PriceOracle> = match args.exchange_rates_db.as_ref() {
        Some(path) => Box::new(ExchangeRates::new(path, &config.fiat)?),
        None => {
            info!("No exchange rates database given, using fixed prices");
            Box::new(FixedPrices::default())
        }
    };

    let mut ledger = Ledger::with_lots(config, prices, &addresses, checkpoint.into_lots());
    for tx in &transactions {
        ledger.add_transaction(tx)?;
    }

    // Save open lots to a new checkpoint.
    if let Some(path) = args.output_checkpoint.as_ref() {
        debug!("Saving checkpoint to {path:?}");
        let latest = transactions.last().map(|tx| tx.timestamp).or(checkpoint_time);
        LotsCheckpoint::new(ledger.open_lots(), latest)
            .save(path)
            .map_err(|err| Error::OutputCheckpoint(path.clone(), Box::new(err)))?;
        debug!("Saving checkpoint completed");
    }

    let sums = Sums::new(&ledger);
    sums.assert_error_check();

    let gains = GainsWorksheet::new(ledger.gains());
    write_worksheet(&args, "gains", "Capital Gains Worksheet", &gains, true)?;
    let income = IncomeWorksheet::new(ledger.income());
    write_worksheet(&args, "income", "Mining Income Worksheet", &income, true)?;
    let lots = LotsWorksheet::new(ledger.open_lots());
    write_worksheet(&args, "open-lots", "Open Lots Worksheet", &lots, args.verbose)?;
    write_worksheet(&args, "sums", "Sums Worksheet", &sums, true)?;

    if args.verbose {
        stats.pretty_print();
    }
    println!("{}", ledger.checklist());

    Ok(())
}

/// Write a worksheet to the output directory, or print it when there is none.
fn write_worksheet(
    args: &Args,
    name: &str,
    title: &str,
    worksheet: &impl Display,
    print: bool,
) -> Result<(), Error> {
    if let Some(root) = args.worksheet_path.as_ref() {
        let path = root.join(format!("{}{name}.csv", args.worksheet_prefix));
        std::fs::write(&path, worksheet.to_string())?;

        let heading = format!("{title} written to {}", path.display());
        println!("{heading}");
        println!("{}", underline(&heading));
        println!();
    } else if print {
        println!("{title}");
        println!("{}", underline(title));
        println!();
        println!("{worksheet}");
        println!();
    }

    Ok(())
}

fn underline(heading: &str) -> String {
    heading
        .chars()
        .map(|ch| if ch == ' ' { ' ' } else { '=' })
        .collect()
}
