// mrcbf_sim/src/main.rs

//! Runs one scenario from the command line.
//!
//! `cargo run -p mrcbf_sim -- --scenario assets/scenarios/head_on.toml`

use std::io;
use std::process::ExitCode;

use clap::Parser;

use mrcbf_sim::cli::Cli;
use mrcbf_sim::prelude::{load_scenario, run_scenario, write_log, RunError};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), RunError> {
    // --- 1. Load Simulation Configuration ---
    if let Some(path) = &cli.scenario {
        if !path.is_file() {
            return Err(RunError::MissingScenario(path.clone()));
        }
    }
    let mut config = load_scenario(cli.scenario.as_deref())?;
    cli.apply_overrides(&mut config);

    // --- 2. Run ---
    let output = run_scenario(&config)?;
    println!("{}", output.summary);

    // --- 3. Optional telemetry dump ---
    if let Some(path) = &cli.dump_log {
        if path.as_os_str() == "-" {
            let wtr = csv::Writer::from_writer(io::stdout().lock());
            write_log(&output.result.log, &output.state_layout, wtr)?;
        } else {
            let wtr = csv::Writer::from_path(path)?;
            write_log(&output.result.log, &output.state_layout, wtr)?;
            log::info!("Wrote {} log entries to {}", output.result.log.len(), path.display());
        }
    }
    Ok(())
}
