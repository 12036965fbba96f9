//! proctree — inspect and signal a rooted process tree
//!
//! ```text
//! proctree [Option] <root_process>              -dx | -dt | -dc
//! proctree [Option] <root_process> [process_id] -rp -nd -dd -sb -bz -zd -gc -sz -kz
//! proctree <root_process> <process_id>
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use proctree::config::{self, ProctreeConfig};
use proctree::router::{self, USAGE};
use proctree::{
    Ancestry, Classifier, Dispatcher, DryRun, NixSignaller, ProcFs, Router, SignalPlan,
    SignalSender,
};

#[derive(Parser)]
#[command(name = "proctree")]
#[command(about = "Inspect and signal the descendants of a process")]
#[command(version)]
struct Cli {
    /// Compute signal targets without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Configuration file (defaults to $PROCTREE_CONFIG, then /etc/proctree/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// [Option] <root_process> [process_id]
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    words: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // Usage errors are reported before anything reads the process table
    let invocation = match router::parse_args(cli.words.as_slice()) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {e}. Usage: proctree {USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let config_path = config::config_path(cli.config.as_deref());
    let config = config::load_config(&config_path)?;
    init_logging(&config)?;
    if !config_path.exists() {
        debug!("Config file not found at {}, using defaults", config_path.display());
    }

    let plan =
        SignalPlan::from_config(&config.signals).context("Invalid signal configuration")?;
    let dry_run = cli.dry_run || config.engine.dry_run;
    let sender: &dyn SignalSender = if dry_run { &DryRun } else { &NixSignaller };
    if dry_run {
        warn!("Dry run: no signals will be delivered");
    }

    let table = ProcFs::new(&config.proc.root);
    let classifier = Classifier::new(Ancestry::new(&table, config.engine.init_pid));
    let router = Router::new(Dispatcher::new(classifier, sender, plan));

    let outcome = router.run(&invocation);
    for line in &outcome.stdout {
        println!("{line}");
    }
    for line in &outcome.stderr {
        eprintln!("{line}");
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(config: &ProctreeConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log.level)
            .with_context(|| format!("Invalid log level {:?}", config.log.level))?,
    };

    // stdout carries results; diagnostics go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
