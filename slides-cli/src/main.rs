//! Slides CLI
//!
//! Runs a slide script against the dry-run surface and prints a report.
//!
//! Usage:
//!   slides deck.json              # run with default waits
//!   slides deck.json -w 5000      # wait at most 5s for each target
//!   slides deck.json --json       # machine-readable report

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use slides::{DryRunSurface, JsonSlideReader, RunConfig, Runner, SlideReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod report;

#[derive(Parser, Debug)]
#[command(name = "slides", version)]
#[command(about = "Run slide-based screen automation scripts")]
struct Cli {
    /// Script to run (.json)
    script: Option<PathBuf>,

    /// Default maximum wait for targets, in milliseconds
    #[arg(short, long, value_name = "MS", env = "SLIDES_MAX_WAIT")]
    wait: Option<u64>,

    /// Monitor to run on (0 is the primary)
    #[arg(long, default_value_t = 0, env = "SLIDES_SCREEN_ID")]
    screen: u32,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> RunConfig {
        let config = RunConfig::default().with_screen_id(self.screen);
        match self.wait {
            Some(ms) => config.with_max_wait(Duration::from_millis(ms)),
            None => config,
        }
    }
}

fn print_usage() {
    println!("{}", Cli::command().render_usage());
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = e.print();
                }
                _ => print_usage(),
            }
            return ExitCode::SUCCESS;
        }
    };

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let reader = JsonSlideReader::new();
    let script = match &cli.script {
        Some(path) if path.is_file() && reader.supports(path) => path.clone(),
        _ => {
            println!("No such file.");
            print_usage();
            return Ok(ExitCode::SUCCESS);
        }
    };

    let slides = match reader.read(&script) {
        Ok(slides) => slides,
        Err(e) => {
            println!("Could not read {}: {}", script.display(), e);
            print_usage();
            return Ok(ExitCode::SUCCESS);
        }
    };

    let config = cli.config();
    info!(
        "Running {} ({} slides, max wait {}ms, screen {})",
        script.display(),
        slides.len(),
        config.max_wait.as_millis(),
        config.screen_id
    );

    if let Ok(json) = serde_json::to_string(&config) {
        debug!("Effective configuration: {}", json);
    }

    let runner = Runner::new(Arc::new(DryRunSurface::default()), config);
    let handle = runner.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping run");
            handle.stop();
        }
    });

    if !cli.json {
        report::print_header(&script, slides.len());
    }
    let outcome = runner.run(&slides).await;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&outcome).context("Failed to serialize run report")?;
        println!("{json}");
    } else {
        report::print_report(&outcome);
    }

    Ok(if outcome.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
