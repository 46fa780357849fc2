mod host;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};

use keel_core::config::ConfigData;
use keel_core::event::StandardEvent;
use keel_core::kernel::Result;
use keel_core::kernel::constants::{APP_NAME, APP_VERSION};

/// Keel: module lifecycle kernel and event bus host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print `pong` and exit without booting
    #[arg(long)]
    ping: bool,

    /// Log filter directive (e.g. `debug`, `keel_core=trace`); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file (.json, .yaml or .toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot, print the system status as JSON, then stop
    Status,
    /// List the standard event vocabulary grouped by domain
    Events,
    /// Boot and run until Ctrl-C or until the duration elapses
    Run {
        /// Stop after this many milliseconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    logging::init(args.log_level.as_deref());

    let outcome = match args.command.unwrap_or(Commands::Status) {
        Commands::Events => {
            print_events();
            Ok(())
        }
        Commands::Status => status(args.config.as_deref()).await,
        Commands::Run { duration_ms } => run(args.config.as_deref(), duration_ms.map(Duration::from_millis)).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn load_config(path: Option<&Path>) -> Result<ConfigData> {
    match path {
        Some(path) => Ok(ConfigData::load_from_path(path).await?),
        None => Ok(ConfigData::new()),
    }
}

async fn status(config: Option<&Path>) -> Result<()> {
    let host = host::boot(load_config(config).await?).await?;
    if let Err(e) = host.kernel.start().await {
        host.kernel.stop().await;
        return Err(e);
    }

    let status = host.kernel.status();
    let rendered = serde_json::to_string_pretty(&status).map_err(|e| keel_core::kernel::Error::Other(e.to_string()))?;
    println!("{}", rendered);

    host.kernel.stop().await;
    Ok(())
}

async fn run(config: Option<&Path>, duration: Option<Duration>) -> Result<()> {
    let host = host::boot(load_config(config).await?).await?;
    if let Err(e) = host.kernel.start().await {
        host.kernel.stop().await;
        return Err(e);
    }
    println!("{} v{} running ({} modules)", APP_NAME, APP_VERSION, host.kernel.module_count());

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            } else {
                info!("Interrupt received");
            }
        }
    }

    host.kernel.stop().await;
    log::debug!(
        "Storage backend '{}' connected after stop: {}",
        host.storage.backend_type(),
        host.storage.is_connected()
    );
    debug_listeners(&host);
    println!("{} stopped", APP_NAME);
    Ok(())
}

fn debug_listeners(host: &host::Host) {
    let info = host.bus.debug_info();
    if info.total_listeners > 0 {
        log::debug!("{} listener(s) left on the bus after stop: {:?}", info.total_listeners, info.event_names);
    }
}

fn print_events() {
    let mut current_domain = "";
    for event in StandardEvent::ALL {
        if event.domain() != current_domain {
            current_domain = event.domain();
            println!("{}:", current_domain);
        }
        println!("  {}", event.name());
    }
}
