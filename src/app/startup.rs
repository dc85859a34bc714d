//! Process startup and lifecycle
//!
//! parse arguments → load settings → init logging → resolve scanner →
//! bind → serve → initialize scanner → wait for a shutdown signal →
//! stop any in-flight scan → exit.

use crate::app::cli::args::Args;
use crate::app::cli::config::{ConfigError, Settings};
use crate::core::error_handling::{fatal_message, log_error_with_context, ContextualError};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version;
use crate::plugin::api::{all_scanners, create_scanner, Dispatcher, PluginError, ScannerExecutor};
use crate::server;
use clap::Parser;
use colored::Colorize;
use log::{debug, info, warn};
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Failed to listen on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Control surface failed: {0}")]
    Serve(#[source] std::io::Error),
}

impl ContextualError for StartupError {
    fn is_user_actionable(&self) -> bool {
        match self {
            StartupError::Config(e) => e.is_user_actionable(),
            StartupError::Plugin(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            StartupError::Config(e) => e.user_message(),
            StartupError::Plugin(e) => e.user_message(),
            _ => None,
        }
    }
}

/// Entry point for the binary; returns the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();

    if args.version {
        println!("{}", version::version_banner());
        return 0;
    }

    let settings = match Settings::load(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is not up yet
            eprintln!("{}", fatal_message(&e, "Failed to load configuration"));
            return 1;
        }
    };

    let color = settings
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal());
    colored::control::set_override(color);

    if args.list_scanners {
        print_scanners(&settings.scanner);
        return 0;
    }

    if let Err(e) = init_logging(
        &settings.log_level,
        settings.log_format,
        settings.log_file.as_deref(),
        color,
    ) {
        eprintln!("FATAL: Failed to initialize logging: {}", e);
        return 1;
    }

    info!("{}", version::version_banner());
    if let Some(path) = &settings.config_file {
        info!("Loaded configuration from {}", path.display());
    }
    debug!("Settings: {:?}", settings);

    match ShutdownCoordinator::guard_with_coordinator(|coordinator| run(settings, coordinator)).await
    {
        Ok(()) => 0,
        Err(e) => {
            log_error_with_context(&e, "Scanner plugin stopped");
            1
        }
    }
}

fn print_scanners(selected: &str) {
    println!("{}", "Builtin scanners:".bold());
    for entry in all_scanners() {
        let marker = if entry.name == selected { "*" } else { " " };
        println!(
            "{} {} {}",
            marker,
            format!("{:<10}", entry.name).green(),
            entry.description
        );
    }
}

/// Bind the control surface and serve until shutdown
pub async fn run(settings: Settings, coordinator: ShutdownCoordinator) -> Result<(), StartupError> {
    let scanner = create_scanner(&settings.scanner)?;
    let listener = TcpListener::bind(settings.listen_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: settings.listen_address,
            source,
        })?;

    serve_plugin(
        listener,
        ScannerExecutor::new(scanner),
        settings.shutdown_grace,
        coordinator,
    )
    .await
}

/// Serve `executor` on `listener` until `coordinator` signals shutdown
///
/// The control surface is reachable (reporting `NotReady`) while the scanner
/// initializes. Initialization failure shuts the process down.
pub async fn serve_plugin(
    listener: TcpListener,
    executor: ScannerExecutor,
    shutdown_grace: Duration,
    coordinator: ShutdownCoordinator,
) -> Result<(), StartupError> {
    let executor = Arc::new(executor);
    let dispatcher = Arc::new(Dispatcher::new(executor.clone()));

    let mut server = tokio::spawn(server::serve(
        listener,
        dispatcher.clone(),
        coordinator.shutdown_signal(),
    ));
    let shutdown = coordinator.shutdown_signal();
    tokio::pin!(shutdown);

    let mut shutdown_seen = false;
    tokio::select! {
        result = executor.initialize() => {
            if let Err(e) = result {
                coordinator.trigger_shutdown();
                let _ = server.await;
                return Err(e.into());
            }
        }
        _ = &mut shutdown => shutdown_seen = true,
    }

    if !shutdown_seen {
        tokio::select! {
            _ = &mut shutdown => {}
            result = &mut server => {
                warn!("Control surface exited before shutdown was requested");
                return server_outcome(result);
            }
        }
    }

    info!("Shutting down");
    dispatcher.shutdown(shutdown_grace).await;
    let outcome = server_outcome(server.await);
    info!("Final status: {}", dispatcher.status().state);
    outcome
}

fn server_outcome(result: Result<std::io::Result<()>, JoinError>) -> Result<(), StartupError> {
    match result {
        Ok(served) => served.map_err(StartupError::Serve),
        Err(join) => Err(StartupError::Serve(std::io::Error::other(join.to_string()))),
    }
}
