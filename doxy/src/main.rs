//! Doxy - Entry Point
//!
//! Builds containers from branches of a git repository on request and
//! proxies HTTP traffic to them by deployment name.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use doxy::app::run::run;
use doxy::logs::{init_logging, LogOptions};
use doxy::settings::{parse_cli_args, Settings};
use doxy::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = match parse_cli_args(env::args().skip(1)) {
        Ok(cli_args) => cli_args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    // Settings file first, command line flags on top
    let mut settings = match cli_args.get("config") {
        Some(path) => match Settings::load(Path::new(path)).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    if let Err(e) = settings.apply_cli_args(&cli_args) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let options = match settings.to_app_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("Running doxy with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run doxy: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
