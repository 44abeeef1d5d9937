//! CLI command handlers

use super::console::Console;
use super::render;
use anyhow::{Context, Result};
use chatloop_core::events::EventHub;
use chatloop_core::models::{ChannelId, Configuration, LogLevel, PaginationExit, UserId};
use chatloop_core::services::InteractionService;
use chatloop_core::transport::{ChatTransport, MemoryTransport, RateLimitedTransport};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

/// Default value of the `--config-file` argument
pub const DEFAULT_CONFIG_FILE: &str = "~/.config/chatloop/config.toml";

/// Expand `~/` and map the documented default onto the platform config directory
pub fn resolve_config_path(config_file: &str) -> Result<PathBuf> {
    if config_file == DEFAULT_CONFIG_FILE {
        return Configuration::default_config_path()
            .map_err(|e| anyhow::anyhow!("Failed to get default config path: {}", e));
    }
    if let Some(rest) = config_file.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        return Ok(PathBuf::from(home).join(rest));
    }
    Ok(PathBuf::from(config_file))
}

fn load_config(config_file: &str) -> Result<Configuration> {
    let path = resolve_config_path(config_file)?;
    Configuration::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))
}

fn check_config(config: &Configuration) -> Result<()> {
    config.validate().map_err(|errors| {
        anyhow::anyhow!("Configuration validation failed: {}", errors.join("; "))
    })
}

/// Handle the 'console' command
pub async fn handle_console(
    config_file: String,
    script: Option<PathBuf>,
    user: Option<u64>,
    channel: Option<u64>,
) -> Result<()> {
    let mut config = load_config(&config_file)?;
    if let Some(user) = user {
        config.console_user_id = user;
    }
    if let Some(channel) = channel {
        config.console_channel_id = channel;
    }
    check_config(&config)?;

    chatloop_core::services::logging::init_logging(config.log_level.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let (calls_tx, mut calls_rx) = tokio::sync::mpsc::unbounded_channel();
    let memory = Arc::new(MemoryTransport::new(UserId(config.bot_user_id)).with_observer(calls_tx));
    let transport: Arc<dyn ChatTransport> = Arc::new(RateLimitedTransport::new(
        Arc::clone(&memory),
        config.reaction_rate_limit(),
    ));

    let channel_id = ChannelId(config.console_channel_id);
    let user_id = UserId(config.console_user_id);
    let service = InteractionService::new(transport, EventHub::new(), config);

    let printer = tokio::spawn(async move {
        while let Some(call) = calls_rx.recv().await {
            println!("{}", render::render_call(&call));
        }
    });

    tracing::info!(channel = %channel_id, user = %user_id, "console bot ready");
    let console = Console::new(service, Arc::clone(&memory), channel_id, user_id);

    match script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            console.run(BufReader::new(file)).await?;
        }
        None => {
            println!("💬 Console channel {} as user {}", channel_id, user_id);
            println!("   Type !help for commands, :react <id> <emoji> to react, :quit to leave");
            console.run(BufReader::new(tokio::io::stdin())).await?;
        }
    }

    // Dropping the last transport handle closes the observer channel
    drop(memory);
    printer.await.context("console printer stopped unexpectedly")?;
    Ok(())
}

/// Read one line from stdin (synchronous)
fn read_user_input_sync() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_line(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

fn ask(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    Ok(read_user_input_sync()?.trim().to_string())
}

fn parse_timeout(input: &str) -> Option<Option<u32>> {
    match input {
        "none" | "off" => Some(None),
        other => other.parse::<u32>().ok().map(Some),
    }
}

fn describe_timeout(timeout: Option<u32>) -> String {
    match timeout {
        Some(seconds) => seconds.to_string(),
        None => "none".to_string(),
    }
}

fn log_level_name(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Handle 'config --init' command
pub async fn handle_config_init(config_file: String) -> Result<()> {
    println!("⚙️  Initializing chatloop configuration");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = resolve_config_path(&config_file)?;
    println!("📄 Config file: {}", config_path.display());

    let mut config = if config_path.exists() {
        println!("⚠️  Configuration file already exists. Loading existing values...");
        Configuration::load_from_file(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load existing config: {}", e))?
    } else {
        println!("✨ Creating new configuration with defaults...");
        Configuration::default()
    };

    println!("\n📝 Please answer the following questions (press Enter to use default):\n");

    let input = ask(&format!(
        "Prompt timeout in seconds, or 'none' [{}]: ",
        describe_timeout(config.prompt_timeout_seconds)
    ))?;
    if !input.is_empty() {
        match parse_timeout(&input) {
            Some(timeout) => config.prompt_timeout_seconds = timeout,
            None => println!("⚠️  Invalid timeout value, using default"),
        }
    }

    let input = ask(&format!(
        "Pagination idle timeout in seconds, or 'none' [{}]: ",
        describe_timeout(config.pagination_timeout_seconds)
    ))?;
    if !input.is_empty() {
        match parse_timeout(&input) {
            Some(timeout) => config.pagination_timeout_seconds = timeout,
            None => println!("⚠️  Invalid timeout value, using default"),
        }
    }

    let current_exit = match config.pagination_exit {
        PaginationExit::RemoveReactions => "remove",
        PaginationExit::DeleteMessage => "delete",
    };
    let input = ask(&format!(
        "When pagination ends, remove reactions or delete the message? (remove/delete) [{}]: ",
        current_exit
    ))?;
    match input.to_lowercase().as_str() {
        "" => {}
        "remove" => config.pagination_exit = PaginationExit::RemoveReactions,
        "delete" => config.pagination_exit = PaginationExit::DeleteMessage,
        _ => println!("⚠️  Invalid choice, using default"),
    }

    let input = ask(&format!(
        "Minimum delay between reaction calls in ms [{}]: ",
        config.reaction_rate_limit_ms
    ))?;
    if !input.is_empty() {
        match input.parse::<u64>() {
            Ok(ms) => config.reaction_rate_limit_ms = ms,
            Err(_) => println!("⚠️  Invalid delay, using default"),
        }
    }

    let input = ask(&format!("Cancel reaction [{}]: ", config.cancel_reaction))?;
    if !input.is_empty() {
        config.cancel_reaction = input;
    }

    let input = ask(&format!(
        "Log level (error/warn/info/debug/trace) [{}]: ",
        log_level_name(&config.log_level)
    ))?;
    if !input.is_empty() {
        config.log_level = match input.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => {
                println!("⚠️  Invalid log level, using default");
                config.log_level.clone()
            }
        };
    }

    println!("\n🔍 Validating configuration...");
    match config.validate() {
        Ok(()) => println!("✅ Configuration is valid"),
        Err(errors) => {
            println!("❌ Configuration validation failed:");
            for error in &errors {
                println!("   - {}", error);
            }
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("\n💾 Saving configuration to {}...", config_path.display());
    config
        .save_to_file(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to save configuration: {}", e))?;

    println!("✅ Configuration saved successfully!");
    println!("\n📋 Configuration summary:");
    println!(
        "   Prompt timeout: {}",
        describe_timeout(config.prompt_timeout_seconds)
    );
    println!(
        "   Pagination timeout: {}",
        describe_timeout(config.pagination_timeout_seconds)
    );
    println!("   Pagination exit: {:?}", config.pagination_exit);
    println!("   Reaction delay: {} ms", config.reaction_rate_limit_ms);
    println!("   Cancel reaction: {}", config.cancel_reaction);
    println!("   Log level: {}", log_level_name(&config.log_level));

    Ok(())
}
