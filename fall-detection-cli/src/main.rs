use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fall_detection::config::AppConfig;
use fall_detection_cli::commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries data
    let default_level = if cli.verbose() {
        "debug".to_string()
    } else {
        AppConfig::log_level_from_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level))
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            cli.execute().await
        })
}
