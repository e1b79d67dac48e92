// Shellgate - Main Entry Point
//
// CLI front end for the command authorization gateway:
// - serve: JSON-lines request loop on stdin/stdout
// - exec: classify and run a single command (approval-gated ones are refused)
// - classify / whitelist / platform: inspection helpers
//
// Logs go to stderr; stdout carries only protocol output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shellgate::config::Config;
use shellgate::events::{CommandEvent, EventReceiver};
use shellgate::server::{self, Request, ResponseBody};
use shellgate::service::CommandService;
use shellgate::tools::Classification;
use shellgate::whitelist::SecurityLevel;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Shellgate: whitelist-and-approval gateway for external commands
#[derive(Parser, Debug)]
#[command(name = "shellgate")]
#[command(version)]
#[command(about = "Gate command execution behind a whitelist and approval queue", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ~/.config/shellgate/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve JSON-lines requests on stdin, one response per stdout line
    Serve,
    /// Classify and run one command; commands that need approval are refused
    Exec {
        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Command to run
        command: String,

        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show how a command would be classified without running it
    Classify {
        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the effective whitelist
    Whitelist,
    /// Print platform and shell information
    Platform,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(args.verbose, &config)?;

    let service = Arc::new(CommandService::from_config(&config));

    match args.command {
        Some(Commands::Serve) => {
            info!("Shellgate v{} serving on stdin/stdout", env!("CARGO_PKG_VERSION"));
            let logger = tokio::spawn(log_events(service.subscribe()));

            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            server::serve(Arc::clone(&service), stdin, &mut stdout).await?;

            logger.abort();
            info!("Request stream closed, shutting down");
        }
        Some(Commands::Exec {
            timeout_ms,
            command,
            args,
        }) => {
            // Nothing outlives this process to approve a queued command
            if service.classify(&command, &args)
                == Classification::Level(SecurityLevel::RequiresApproval)
            {
                anyhow::bail!(
                    "Command requires approval: {}. Use `shellgate serve` to queue it for approval",
                    command
                );
            }
            let body = server::handle(
                &service,
                Request::ExecuteCommand {
                    command,
                    args,
                    timeout_ms,
                    requested_by: Some("cli".to_string()),
                },
            )
            .await;
            print_json(&body)?;
            if let ResponseBody::Error { message, .. } = body {
                anyhow::bail!(message);
            }
        }
        Some(Commands::Classify { command, args }) => {
            print_json(&service.classify(&command, &args))?;
        }
        Some(Commands::Whitelist) => {
            print_json(&service.get_whitelist())?;
        }
        Some(Commands::Platform) => {
            print_json(service.platform_info())?;
        }
        None => {
            info!("No command specified. Use \"shellgate --help\" for usage.");
        }
    }

    Ok(())
}

/// Set up the subscriber: `--verbose`, then `RUST_LOG`, then `[logging]`
fn init_tracing(verbose: bool, config: &Config) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

/// Log every lifecycle event until the bus goes away
async fn log_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match &*event {
            CommandEvent::Pending(pending) => info!(
                "[Pending Command] ID: {}, Command: {}",
                pending.id,
                pending.display_line()
            ),
            CommandEvent::Approved { id, stdout, .. } => info!(
                "[Approved Command] ID: {}, Output length: {}",
                id,
                stdout.len()
            ),
            CommandEvent::Denied { id, reason } => {
                info!("[Denied Command] ID: {}, Reason: {}", id, reason)
            }
            CommandEvent::Failed { id, error } => {
                warn!("[Failed Command] ID: {}, Error: {}", id, error)
            }
            CommandEvent::ApprovalTimeout { id, .. } => {
                warn!("[Approval Timeout] ID: {}", id)
            }
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
