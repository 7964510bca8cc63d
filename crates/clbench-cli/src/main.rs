//! clbench CLI application
//!
//! Selects an OpenCL device, benchmarks the `aplusb` kernel and validates
//! the result against the CPU.

use anyhow::{Context, Result};
use clap::Parser;
use clbench_cli::cli::{Cli, Commands};
use clbench_cli::exit::exit_code_for;
use clbench_cli::output::{ConsoleObserver, DeviceListing, OutputConfig, OutputFormat, summary_line};
use clbench_opencl::config::LoggingConfig;
use clbench_opencl::pipeline::{NoopObserver, discover};
use clbench_opencl::{BenchConfig, LogFormat, catalog};
use console::style;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = real_main(&cli) {
        error!("command failed: {e:#}");
        eprintln!("{} {e}", style("Error:").red().bold());
        for cause in e.chain().skip(1) {
            eprintln!("  {} {cause}", style("Caused by:").dim());
        }
        std::process::exit(exit_code_for(&e));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let output = OutputConfig { format: cli.format, quiet: cli.quiet };
    let config = cli.load_config()?;
    setup_logging(&config.logging, output.log_level_override())?;

    match cli.command() {
        Commands::Run => run_benchmark(&config, output),
        Commands::Devices => list_devices(&config, output),
        Commands::Config => show_config(&config, output),
    }
}

/// Logs go to stderr so stdout stays parseable in JSON mode.
fn setup_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&config.level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter '{level}'"))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.format {
        LogFormat::Json => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init();
        }
        LogFormat::Compact => {
            subscriber.compact().init();
        }
        LogFormat::Pretty => {
            subscriber.pretty().init();
        }
    }

    Ok(())
}

fn run_benchmark(config: &BenchConfig, output: OutputConfig) -> Result<()> {
    info!(
        elements = config.workload.elements,
        work_group_size = config.workload.work_group_size,
        trials = config.workload.trials,
        "starting benchmark"
    );

    let mut observer = ConsoleObserver::new(output);
    let report = clbench_opencl::run(config, &mut observer).context("benchmark failed")?;

    output.emit_result(&report, |r| println!("{}", style(summary_line(r)).green()))
}

fn list_devices(config: &BenchConfig, output: OutputConfig) -> Result<()> {
    let platforms = discover(&mut NoopObserver).context("device discovery failed")?;
    let selected = catalog::resolve(&platforms, config.device.ordinal).ok().map(|d| d.ordinal());
    let listing = DeviceListing { platforms, selected };

    output.emit_result(&listing, |l| {
        for line in l.lines() {
            println!("{line}");
        }
    })
}

fn show_config(config: &BenchConfig, output: OutputConfig) -> Result<()> {
    match output.format {
        OutputFormat::Json => output.emit_result(config, |_| {}),
        OutputFormat::Text => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
