use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cryofit::{
    engine::{cancel::CancellationToken, progress::ProgressReporter},
    inputs::classify::RunArguments,
    workflows::{
        self,
        fit::{FitOptions, FitReport},
    },
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub fn run(cli: &Cli) -> Result<()> {
    let options = fit_options(cli, std::env::current_dir()?)?;
    let mut args = RunArguments::new(cli.tokens.iter().cloned());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting model fitting...");
    info!("Invoking the core fitting workflow...");
    let report = workflows::fit::run(&mut args, &options, &reporter)?;

    info!(
        states = report.states,
        total_energy = report.final_energy.total,
        "Workflow finished."
    );
    print_summary(&report);
    println!("OK");
    Ok(())
}

fn fit_options(cli: &Cli, work_dir: PathBuf) -> Result<FitOptions> {
    let cancel = match cli.timeout {
        Some(seconds) => {
            let timeout = Duration::try_from_secs_f64(seconds).map_err(|_| {
                CliError::Argument(format!(
                    "--timeout must be a non-negative number of seconds, got {seconds}"
                ))
            })?;
            CancellationToken::with_timeout(timeout)
        }
        None => CancellationToken::new(),
    };
    Ok(FitOptions {
        validated: cli.prevalidated,
        work_dir,
        cancel,
    })
}

fn print_summary(report: &FitReport) {
    if let Some(path) = report.synthesized_map() {
        println!("Map synthesized from model: {}", path.display());
    }
    println!("CC before fit: {:.4}", report.pre_fit_cc);
    if let Some(cc) = report.post_fit_cc {
        println!("CC after fit: {:.4}", cc);
    }
    println!(
        "Wrote {} states to {}",
        report.states,
        report.outputs.ensemble.display()
    );
    println!("Refined model: {}", report.outputs.refined.display());
}
