//! webssh: browser terminal for a remote SSH host
//!
//! Usage:
//!   webssh                   - Start the server (settings from ./webssh.toml if present)
//!   webssh --config <path>   - Start the server with an explicit settings file
//!   webssh --help            - Show help

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use webssh_core::Settings;
use webssh_ws::start_server;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Serve the terminal
    Server { settings_path: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args(std::env::args().skip(1)).map_err(|e| anyhow::anyhow!(e))?;

    let settings_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("webssh {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { settings_path } => settings_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let settings = Settings::load(settings_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Settings error: {}", e))?;

    tracing::info!("Starting webssh...");
    tracing::info!("Connection config file: {}", settings.ssh.config_file);
    tracing::warn!("Passwords are stored in plain text in {}", settings.ssh.config_file);

    run_server(settings).await
}

/// Parse command line arguments (without the program name)
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RunMode, String> {
    let mut settings_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => match args.next() {
                Some(path) => settings_path = Some(PathBuf::from(path)),
                None => return Err(format!("{} requires a path", arg)),
            },
            other => return Err(format!("Unknown argument: {} (try --help)", other)),
        }
    }

    Ok(RunMode::Server { settings_path })
}

/// Print help message
fn print_help() {
    println!("webssh - browser terminal for a remote SSH host");
    println!();
    println!("Usage:");
    println!("  webssh                  Start the server");
    println!("  webssh --config <path>  Use an explicit settings file (default: ./webssh.toml)");
    println!("  webssh --help           Show this help message");
    println!("  webssh --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  WEBSSH_HOST                      Listen host (default: 127.0.0.1)");
    println!("  WEBSSH_PORT                      Listen port (default: 5000)");
    println!("  WEBSSH_CONFIG_FILE               Connection config JSON (default: config.json)");
    println!("  WEBSSH_ACCEPT_UNKNOWN_HOST_KEYS  Trust unknown host keys, insecure (default: false)");
    println!("  WEBSSH_KNOWN_HOSTS               known_hosts file (default: ~/.ssh/known_hosts)");
    println!("  WEBSSH_OUTPUT_MODE               text or binary (default: text)");
    println!("  WEBSSH_POLL_INTERVAL_MS          WebSocket poll interval (default: 10)");
    println!("  RUST_LOG                         Log filter");
}

/// Run the server until Ctrl+C
async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let mut handle = tokio::spawn(async move { start_server(&settings).await });

    tracing::info!("Press Ctrl+C to exit");

    // Open bridge sessions are dropped with the runtime when main returns.
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down...");
            handle.abort();
        }
        joined = &mut handle => match joined {
            Ok(Ok(())) => tracing::info!("Server stopped"),
            Ok(Err(e)) => return Err(anyhow::anyhow!("Server error: {}", e)),
            Err(e) => return Err(anyhow::anyhow!("Server task failed: {}", e)),
        },
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
