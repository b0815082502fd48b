use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use hydrocore::io::integrity::SonarModel;
use hydrocore::telemetry::Profiler;
use std::path::PathBuf;
use std::process::ExitCode;
use workflow::config::{CliOverrides, WorkflowConfig};
use workflow::runner::{FileOutcome, Runner};

mod backend;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Single-file hydroacoustic survey processing")]
struct Args {
    /// Raw (.raw) or converted (.nc/.zarr) survey file
    #[arg(long)]
    raw_data_source: Option<PathBuf>,
    /// EK60, ES70, EK80, EA640, AZFP or AD2CP
    #[arg(long)]
    sonar_model: Option<SonarModel>,
    #[arg(long)]
    output_folder: Option<PathBuf>,
    /// Also write shoal, NASC, Sv and GPS tables as CSV
    #[arg(long, default_value_t = false)]
    export_csv: bool,
    /// Print wall-clock time per stage at the end
    #[arg(long, default_value_t = false)]
    profile: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log filter, e.g. `info` or `hydrocore=debug`; overrides RUST_LOG
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

const EXIT_REJECTED: u8 = 2;

fn init_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let overrides = CliOverrides {
        raw_path: args.raw_data_source,
        sonar_model: args.sonar_model,
        output_folder: args.output_folder,
        export_csv: args.export_csv,
        profile: args.profile,
    };
    let config = WorkflowConfig::resolve(args.config.as_deref(), overrides)?;
    let raw_path = config.raw_path()?.to_path_buf();
    let profile = config.denoise.profile;

    let runner = Runner::new(config);
    let profiler = Profiler::new();
    let outcome = runner
        .process_file(&raw_path, &profiler)
        .with_context(|| format!("processing {}", raw_path.display()))?;

    let code = match outcome {
        FileOutcome::Processed(report) => {
            println!(
                "Done: {} shoal record(s), {} warning(s), {} mask failure(s)",
                report.shoals.iter().filter(|record| !record.is_placeholder()).count(),
                report.warnings.len(),
                report.mask_failures.len()
            );
            ExitCode::SUCCESS
        }
        FileOutcome::Rejected(integrity) => {
            println!("{}", serde_json::to_string_pretty(&integrity)?);
            ExitCode::from(EXIT_REJECTED)
        }
    };

    if profile {
        println!("\nProfile ({} error(s))\n{}", profiler.error_count(), profiler.summary());
        log::info!("profile {}", profiler.to_json());
    }
    Ok(code)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
