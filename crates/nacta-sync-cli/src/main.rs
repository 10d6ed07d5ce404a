//! NACTA Sync: entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::info;

use nacta_sync::SyncConfig;
use nacta_sync_cli::app::{reset_only, run_pipeline, RunSummary};
use nacta_sync_cli::driver::find_chromium;
use nacta_sync_cli::{doctor, logging};

#[derive(Parser)]
#[command(
    name = "nacta-sync",
    about = "Retrieve NACTA proscribed-person lists and relay them to the archive host",
    version
)]
struct Cli {
    /// Load environment variables from this file instead of ./.env.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Override BASE_DIR.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset, retrieve, transfer and notify (default).
    Run,

    /// Kill stale browser processes and exit.
    Reset,

    /// Check binaries, remote settings and channels.
    Doctor,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   nacta-sync completions bash > ~/.local/share/bash-completion/completions/nacta-sync
    ///   nacta-sync completions zsh > ~/.zfunc/_nacta-sync
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "nacta-sync", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("cannot load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = SyncConfig::from_env().context("invalid configuration")?;
    if let Some(base) = cli.base_dir {
        config.layout = nacta_sync::Layout::new(base);
    }
    if let Some(browser) = find_chromium(config.browser.chrome_bin.as_ref()) {
        config.add_reset_binary(&browser);
    }

    if let Commands::Doctor = command {
        let ready = doctor::run(&config);
        return Ok(if ready { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    config.layout.ensure().with_context(|| {
        format!("cannot create directories under {}", config.layout.base().display())
    })?;
    let log_path = logging::init(&config.layout, &cli.log_level)?;
    info!("Logging to {}", log_path.display());

    match command {
        Commands::Reset => {
            reset_only(&config);
        }
        _ => {
            let report = run_pipeline(&config).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&RunSummary::new(&report))?);
            }
        }
    }

    // A run that completed exits 0 even when sources failed; the
    // notification carries the per-source outcome.
    Ok(ExitCode::SUCCESS)
}
