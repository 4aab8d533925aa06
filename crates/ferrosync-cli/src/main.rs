//! ferrosync - one-way tree synchronization over a remote file service
//!
//! Pushes a local tree to a remote one or pulls it back, transferring only
//! what changed, deleting what no longer exists on the source side, and
//! optionally moving instead of copying.

mod display;
mod json_output;
mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use display::{display_legend, display_report};
use ferrosync_config::{Config, ConfigLoader};
use ferrosync_network::MountedConnector;
use ferrosync_sync::{ProgressReporter, SyncClient};
use ferrosync_types::{SyncOptions, TransferStatus};
use json_output::SyncResultJson;
use progress::ProgressPrinter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// ferrosync - one-way tree synchronization
#[derive(Parser)]
#[command(
    name = "ferrosync",
    version = env!("CARGO_PKG_VERSION"),
    about = "One-way tree synchronization over a remote file service",
    long_about = "ferrosync mirrors a local directory tree to a remote one (push) or the\n\
                  other way around (pull). New and newer files are transferred, files\n\
                  missing on the source side are deleted, and newer destination files\n\
                  are left alone."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - print one line per file
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Login user
    #[arg(long, global = true)]
    user: Option<String>,

    /// Login password
    #[arg(long, global = true)]
    pass: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Name patterns to skip, in addition to the configured ones
    #[arg(long, global = true)]
    ignore: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local tree to the remote side
    Push(TransferArgs),
    /// Download a remote tree to the local side
    Pull(TransferArgs),
    /// Explain the status symbols
    Legend,
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Write the default configuration to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Local root directory
    local: String,
    /// Remote root directory
    remote: String,
    /// Delete sources after they have been transferred
    #[arg(long = "move")]
    move_sources: bool,
    /// Directory holding the server's filesystem
    #[arg(long)]
    server_root: PathBuf,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(&cli, &config)?;
    info!("ferrosync v{} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Push(args) => {
            let options = transfer_options(SyncOptions::push(), args);
            if !sync_command(&cli, &config, args, options).await? {
                std::process::exit(1);
            }
        }
        Commands::Pull(args) => {
            let options = transfer_options(SyncOptions::pull(), args);
            if !sync_command(&cli, &config, args, options).await? {
                std::process::exit(1);
            }
        }
        Commands::Legend => display_legend(),
        Commands::Config { default, write } => {
            config_command(&config, *default, write.as_deref())?;
        }
    }

    Ok(())
}

/// Configuration file (or the default locations), then command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(user) = &cli.user {
        config.server.user = user.clone();
    }
    if let Some(pass) = &cli.pass {
        config.server.pass = pass.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.sync.ignore.extend(cli.ignore.iter().cloned());
    config.sync.verbose |= cli.verbose;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins; otherwise `--debug` and `--quiet` override the configured
/// level. `--verbose` only adds status lines and leaves the level alone.
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    console::set_colors_enabled(config.logging.colored_output);
    fmt()
        .with_env_filter(filter)
        .with_ansi(config.logging.colored_output)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn transfer_options(options: SyncOptions, args: &TransferArgs) -> SyncOptions {
    if args.move_sources {
        options.with_move()
    } else {
        options
    }
}

/// Run one push or pull; `Ok(false)` means the run aborted
async fn sync_command(
    cli: &Cli,
    config: &Config,
    args: &TransferArgs,
    options: SyncOptions,
) -> Result<bool> {
    debug!("Serving remote paths from {}", args.server_root.display());
    let connector = Arc::new(MountedConnector::new(&args.server_root));
    let client = SyncClient::new(connector, config)?;

    let quiet = cli.quiet || args.json;
    let mut reporter = ProgressReporter::new(uuid::Uuid::new_v4(), options.mode.direction());
    let printer = reporter
        .take_event_receiver()
        .map(|events| ProgressPrinter::new(config.sync.verbose, quiet).spawn(events));

    if !quiet {
        println!(
            "{} {} {} {}",
            style("⟲").blue().bold(),
            style(&args.local).cyan(),
            style(TransferStatus::Uploaded.symbol(options.mode.direction())).bold(),
            style(&args.remote).cyan()
        );
    }

    let outcome = client
        .sync_with_reporter(&args.local, &args.remote, options, reporter)
        .await;
    if let Some(printer) = printer {
        printer.await.context("Progress printer failed")?;
    }

    if args.json {
        let output = SyncResultJson::new(&args.local, &args.remote, options, &outcome);
        println!("{}", output.to_json()?);
        return Ok(outcome.is_ok());
    }

    match outcome {
        Ok(report) => {
            if !cli.quiet {
                display_report(&report);
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("{} {}", style("Sync aborted:").red().bold(), e);
            Ok(false)
        }
    }
}

fn config_command(config: &Config, default: bool, write: Option<&std::path::Path>) -> Result<()> {
    if let Some(path) = write {
        ConfigLoader::generate_default_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Default configuration written to {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        return Ok(());
    }

    let shown = if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        Config::default()
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        let mut current = config.clone();
        if !current.server.pass.is_empty() {
            current.server.pass = "********".to_string();
        }
        current
    };
    print!("{}", serde_yaml::to_string(&shown)?);
    Ok(())
}
