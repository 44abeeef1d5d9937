mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatloop")]
#[command(version = "0.1.0")]
#[command(about = "Chat bot with blocking prompts and reaction pagination")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot against a console channel
    ///
    /// Every line typed becomes a message from the console user. Messages starting
    /// with ! run bot commands (!pick, !pages, !help).
    ///
    /// Directives:
    ///   :react <message id> <emoji>   react to a message as the console user
    ///   :wait <ms>                    pause before the next line
    ///   :quit                         leave
    ///
    /// A line starting with { is read as a raw JSON event, e.g.
    ///   {"type":"reaction","message_id":1000,"channel_id":42,"user_id":7,"emoji":"▶"}
    ///
    /// Examples:
    ///   chatloop console
    ///   chatloop console --script session.txt --user 9
    Console {
        /// Path to configuration file
        #[arg(long, default_value = handlers::DEFAULT_CONFIG_FILE)]
        config_file: String,

        /// Read lines from this file instead of stdin
        #[arg(long)]
        script: Option<PathBuf>,

        /// User id of the console user (overrides config)
        #[arg(short, long)]
        user: Option<u64>,

        /// Channel id of the console channel (overrides config)
        #[arg(short, long)]
        channel: Option<u64>,
    },

    /// Configure chatloop settings interactively
    Config {
        /// Start interactive configuration setup
        #[arg(long)]
        init: bool,

        /// Path to configuration file
        #[arg(long, default_value = handlers::DEFAULT_CONFIG_FILE)]
        config_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Console {
            config_file,
            script,
            user,
            channel,
        } => {
            handlers::handle_console(config_file, script, user, channel).await?;
        }
        Commands::Config { init, config_file } => {
            if init {
                handlers::handle_config_init(config_file).await?;
            } else {
                println!("Config command requires --init flag");
                println!("Usage: chatloop config --init [--config-file PATH]");
            }
        }
    }

    Ok(())
}
