//! depgate - Rule-driven dependency version resolver CLI tool
//!
//! Reads a rule configuration and a package list, reports which packages are
//! outdated and, with `--update`, applies the updates.

use clap::Parser;
use depgate::cli::CliArgs;
use depgate::config::Config;
use depgate::context::{LogContext, Verbosity};
use depgate::domain::Package;
use depgate::error::AppError;
use depgate::exec::CommandExecutor;
use depgate::input::load_packages;
use depgate::orchestrator::Orchestrator;
use depgate::output::{create_formatter, OutputConfig};
use depgate::preflight::ValidateResult;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbosity());

    // Run the main logic and handle errors
    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over the flags
fn init_tracing(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "depgate=debug",
        Verbosity::Trace => "depgate=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Load the rule configuration and the (filtered) package list
fn load_inputs(args: &CliArgs) -> Result<(Config, Vec<Package>), AppError> {
    let mut config = Config::load(&args.config_path())?;
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(usize::from(concurrency));
    }

    let packages = load_packages(&args.packages)?
        .into_iter()
        .filter(|p| args.should_process_rule(&p.rule))
        .collect();
    Ok((config, packages))
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let verbosity = args.verbosity();
    if verbosity >= Verbosity::Verbose {
        eprintln!("depgate v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Root: {}", args.path.display());
        eprintln!("Mode: {:?}", args.mode());
    }

    let (config, packages) = load_inputs(&args)?;
    tracing::info!(packages = packages.len(), rules = config.rules.len(), "starting run");

    let ctx = LogContext::stderr(verbosity);
    let mut orchestrator = Orchestrator::new(Arc::new(config), CommandExecutor::login_shell(), ctx)
        .with_root(&args.path)
        .with_mode(args.mode())
        .with_progress(args.show_progress());
    if args.skip_preflight {
        orchestrator = orchestrator.without_preflight();
    }
    if args.skip_system_tests {
        orchestrator = orchestrator.without_system_tests();
    }

    let report = orchestrator.run(packages).await;

    // Preflight failures come before anything else
    if let Some(Err(e)) = report.validation.clone().map(ValidateResult::into_result) {
        eprint!("{}", AppError::from(e));
    }

    let color = io::stdout().is_terminal() && colored::control::SHOULD_COLORIZE.should_colorize();
    let formatter =
        create_formatter(OutputConfig::from_cli(args.json, verbosity).with_color(color));
    let mut stdout = io::stdout().lock();
    formatter.format(&report, &mut stdout)?;
    stdout.flush()?;

    Ok(ExitCode::from(report.exit_code()))
}
