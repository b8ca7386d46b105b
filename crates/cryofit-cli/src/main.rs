mod cli;
mod commands;
mod error;
mod logging;
mod utils;

use crate::cli::Cli;
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    let cli = Cli::parse();

    if cli.tokens.is_empty() {
        println!("Please provide user.pdb user.map");
        println!("Example: cryo_fit user.pdb user.map");
        std::process::exit(1);
    }

    if let Err(e) = run_app(&cli) {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app(cli: &Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("cryo_fit v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", cli);

    let result = commands::fit::run(cli);
    match &result {
        Ok(()) => info!("Fit completed successfully."),
        Err(e) => error!("Fit failed: {}", e),
    }
    result
}
