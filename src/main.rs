use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use basinflow::config::WorkflowConfig;
use basinflow::driver::Stages;
use basinflow::workflow::{self, RunOptions};

/// NextGen basin workflow: geopackages, forcing, configs and runs.
#[derive(Parser, Debug)]
#[command(name = "basinflow", version, about)]
struct Cli {
    /// Workflow configuration file.
    config: Option<PathBuf>,

    /// Generate geopackages with the R generator.
    #[arg(short = 'g', long = "gpkg")]
    gpkg: bool,

    /// Generate forcing data per basin.
    #[arg(short = 'f', long)]
    forcing: bool,

    /// Generate sub-model configs and realizations.
    #[arg(short = 'c', long)]
    configs: bool,

    /// Partition and run ngen, or ngen-cal when calibrating.
    #[arg(short = 'r', long)]
    run: bool,

    /// Calibration template (default: <workflow_dir>/configs/input_calib.yaml).
    #[arg(long, value_name = "YAML")]
    calib_config: Option<PathBuf>,

    /// Do not ask before `clean: all`.
    #[arg(long)]
    yes: bool,
}

impl Cli {
    fn stages(&self) -> Stages {
        Stages {
            gpkg: self.gpkg,
            forcing: self.forcing,
            configs: self.configs,
            run: self.run,
        }
    }
}

fn run(cli: Cli, config: PathBuf) -> Result<ExitCode> {
    let cfg = WorkflowConfig::load(&config)?;
    env_logger::Builder::new()
        .filter_level(cfg.log_level())
        .parse_default_env()
        .init();

    let stages = cli.stages();
    let opts = RunOptions {
        calib_config: cli.calib_config,
        assume_yes: cli.yes,
    };
    let summary = workflow::run(&cfg, stages, &opts)?;
    Ok(if summary.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.config.clone() {
        Some(config) if cli.stages().any() => config,
        _ => {
            // Printing help only fails on a closed stdout.
            let _ = Cli::command().print_help();
            return ExitCode::SUCCESS;
        }
    };
    match run(cli, config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
