use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use outlay::Ledger;

/// A utility for creating a ledger database populated with sample data.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_filter(filter::LevelFilter::INFO),
        )
        .init();

    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let ledger = Ledger::open(output_path)?;

    println!("Creating demo user 'demo' (password 'demo', security answer 'rex')...");
    ledger.sign_up("demo", "demo", "rex")?;

    println!("Adding sample budgets...");
    ledger.set_budget("Food", 300.0)?;
    ledger.set_budget("Transport", 120.0)?;
    ledger.set_budget("Entertainment", 80.0)?;

    println!("Adding sample expenses...");
    ledger.add_expense("Food", 18.40, "groceries", "2024-06-01", None)?;
    ledger.add_expense("Food", 12.00, "lunch", "2024-06-02", None)?;
    ledger.add_expense("Transport", 2.80, "bus fare", "2024-06-02", None)?;
    ledger.add_expense("Bills", 49.99, "electricity", "2024-06-03", None)?;
    ledger.add_expense("Entertainment", 15.50, "", "", None)?;

    println!("Adding a custom category...");
    ledger.add_category("Travel")?;

    println!("Success!");

    Ok(())
}
