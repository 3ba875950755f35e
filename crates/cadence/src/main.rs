//! Cadence
//!
//! Runs scheduler events one after another, tracking each job through
//! webhook notifications with status polling as a fallback.

use cadence_logging::{init_logging, LogConfig};
use cadence_scheduler::PollingConfig;
use clap::{Parser, Subcommand};
use session::SessionConfig;
use std::process::ExitCode;
use tracing::error;

mod plugin;
mod run;
mod session;

#[derive(Parser, Debug)]
#[command(name = "cadence", about = "Run scheduler events in sequence")]
struct Cli {
    /// Enable verbose logging (debug to the log file and stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Defaults to `plugin`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read plugin parameters from stdin and report as JSON lines on stdout
    Plugin,

    /// Run events by title and print progress to the terminal
    Run {
        /// Scheduler base URL, e.g. http://scheduler:3012
        #[arg(long, env = "CADENCE_API_HOST")]
        api_host: String,

        #[arg(long, env = "CADENCE_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Interface the webhook listener binds to
        #[arg(long)]
        bind_host: Option<String>,

        /// Host the scheduler should use to reach the webhook listener
        #[arg(long)]
        advertise_host: Option<String>,

        /// Milliseconds per completion wait slice
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Status fetch attempts per forced refresh
        #[arg(long)]
        refresh_attempts: Option<u32>,

        /// Event titles, run in the given order
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Plugin);

    // stdout belongs to the plugin protocol; keep stderr quiet for the runner
    let quiet = matches!(command, Commands::Plugin);
    if let Err(err) = init_logging(LogConfig {
        app_name: "cadence",
        verbose: cli.verbose,
        quiet,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let result = match command {
        Commands::Plugin => plugin::run_stdio(),
        Commands::Run {
            api_host,
            api_key,
            bind_host,
            advertise_host,
            poll_interval_ms,
            refresh_attempts,
            titles,
        } => {
            let mut polling = PollingConfig::default();
            if let Some(ms) = poll_interval_ms {
                polling.slice_interval = std::time::Duration::from_millis(ms);
            }
            if let Some(attempts) = refresh_attempts {
                polling.refresh_attempts = attempts;
            }
            let config = SessionConfig {
                api_host,
                api_key,
                bind_host,
                advertise_host,
                polling,
            };
            run::run(&config, &titles)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
