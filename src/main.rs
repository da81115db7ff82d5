use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use paletteer::cli::Args;
use paletteer::config::RunConfig;
use paletteer::{logging, pipeline};

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if args.verbose {
                eprintln!("error: {err:?}");
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = RunConfig::load(args)?;
    let report = pipeline::run(&config)?;

    if !report.failures.is_empty() {
        eprintln!(
            "{} of {} templates failed:",
            report.failures.len(),
            config.templates.len()
        );
        for failure in report.failures {
            let err = anyhow::Error::new(failure.error);
            if args.verbose {
                eprintln!("  - {err:#}");
            } else {
                eprintln!("  - {err}");
            }
        }
    }
    Ok(())
}
