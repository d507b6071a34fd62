mod classify;
mod config_cmd;
mod features;
mod run;
mod train;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

pub use classify::ClassifyCommand;
pub use features::FeaturesCommand;
pub use run::RunCommand;
pub use train::{load_snapshot, Algorithm, TrainCommand};

#[derive(Parser)]
#[command(name = "fall-detect")]
#[command(about = "Pose-based fall detection: feature extraction, movement classification and alerts", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(long, global = true, env = "FALL_DETECTION_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume PoseData messages and publish FeatureData and FallAlert messages
    Run(RunCommand),

    /// Extract features from a recorded table of pose payloads
    Features(FeaturesCommand),

    /// Train and evaluate a movement classifier on feature records
    Train(TrainCommand),

    /// Classify a single angle/rate pair
    Classify(ClassifyCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigSubcommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub async fn execute(self) -> Result<()> {
        if self.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        let config_path = self.config.as_deref();
        match self.command {
            Commands::Run(cmd) => cmd.execute(&Config::load(config_path)?).await,
            Commands::Features(cmd) => cmd.execute(&Config::load(config_path)?).await,
            Commands::Train(cmd) => cmd.execute(&Config::load(config_path)?).await,
            Commands::Classify(cmd) => cmd.execute(&Config::load(config_path)?).await,
            Commands::Config(subcmd) => match subcmd {
                ConfigSubcommands::Show => config_cmd::show_config(config_path),
                ConfigSubcommands::Init { force } => config_cmd::init_config(config_path, force),
            },
            Commands::Completions { shell } => {
                generate_completions(shell);
                Ok(())
            }
        }
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
