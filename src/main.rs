mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use site_parser_core::config;
use site_parser_core::CrawlError;
use site_parser_engine::parse_site;

use crate::cli::Cli;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Embedded defaults, used when no `--config` file is supplied.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

const EXIT_RUNTIME_FAILURE: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the result JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {e}");
            return ExitCode::from(EXIT_RUNTIME_FAILURE);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CrawlError::Config(message)) => {
            error!("{message}");
            ExitCode::from(EXIT_INVALID_ARGS)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(EXIT_RUNTIME_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CrawlError> {
    let defaults = toml::from_str(DEFAULT_CONFIG)
        .map_err(|e| CrawlError::Config(format!("embedded default config: {e}")))?;
    let crawl_config = config::load_from(defaults, cli.config.as_deref(), None)?;
    let result = parse_site(&cli.url, crawl_config).await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .map_err(|e| CrawlError::Other(e.into()))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_parser_core::CrawlConfig;

    #[test]
    fn embedded_default_config_parses_and_matches_builtins() {
        let mut embedded: CrawlConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        embedded.validate().unwrap();

        let builtin = CrawlConfig::default();
        assert_eq!(embedded.max_pages, builtin.max_pages);
        assert_eq!(embedded.max_depth, builtin.max_depth);
        assert_eq!(embedded.user_agent, builtin.user_agent);
    }
}
