//! Logging service

use crate::models::LogLevel;

/// Initialize logging with the specified level. `RUST_LOG`, when set, wins.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => {
            tracing_subscriber::EnvFilter::try_new(directives)?
        }
        _ => tracing_subscriber::EnvFilter::new(level_directive(&level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| e.to_string())?;

    Ok(())
}

fn level_directive(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "chatloop=error,chatloop_core=error",
        LogLevel::Warn => "chatloop=warn,chatloop_core=warn",
        LogLevel::Info => "chatloop=info,chatloop_core=info",
        LogLevel::Debug => "chatloop=debug,chatloop_core=debug",
        LogLevel::Trace => "chatloop=trace,chatloop_core=trace",
    }
}

/// Log a command invocation
pub fn log_command(command: &str, channel: u64, user: u64) {
    tracing::info!(command = command, channel = channel, user = user, "Command invoked");
}

/// Log a system error
pub fn log_error(error: &str, context: Option<&str>) {
    tracing::error!(
        error = error,
        context = context.unwrap_or(""),
        "System error occurred"
    );
}
