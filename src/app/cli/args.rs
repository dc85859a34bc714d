//! Command line arguments
//!
//! Every option is optional here so that values from the configuration
//! file can fill the gaps; [`crate::app::cli::config::Settings`] applies the
//! precedence and the defaults.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "scanplugin")]
#[command(about = "Scanner plugin controlled over an HTTP protocol")]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Address the control surface listens on [default: 127.0.0.1:8080]
    #[arg(
        short = 'a',
        long = "listen-address",
        value_name = "ADDR",
        env = "PLUGIN_SERVER_LISTEN_ADDRESS"
    )]
    pub listen_address: Option<String>,

    /// Builtin scanner to run [default: secrets]
    #[arg(
        short = 's',
        long = "scanner",
        value_name = "NAME",
        env = "PLUGIN_SCANNER_NAME"
    )]
    pub scanner: Option<String>,

    /// Seconds an in-flight scan gets to stop on shutdown [default: 10]
    #[arg(long = "shutdown-grace", value_name = "SECONDS")]
    pub shutdown_grace_seconds: Option<u64>,

    /// Log level
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "PLUGIN_SERVER_LOG_LEVEL",
        value_parser = ["trace", "debug", "info", "warn", "error", "off"]
    )]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored log output
    #[arg(long = "color", action = ArgAction::SetTrue, overrides_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", action = ArgAction::SetTrue, overrides_with = "color")]
    pub no_color: bool,

    /// List the builtin scanners and exit
    #[arg(long = "list-scanners", action = ArgAction::SetTrue)]
    pub list_scanners: bool,

    /// Print version information and exit
    #[arg(short = 'V', long = "version", action = ArgAction::SetTrue)]
    pub version: bool,
}

impl Args {
    /// Explicit color choice from the command line, `None` means auto-detect
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
