use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "site-parser", about = "Single-domain contact crawler: emails & phones as JSON")]
pub struct Cli {
    /// Start URL to crawl
    pub url: String,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Path to a TOML or JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log verbosity (written to stderr)
    #[arg(long, value_enum, default_value = "warning", ignore_case = true)]
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}
