use crate::catalog::Suggestion;
use crate::config::Settings;
use crate::core::error::AskError;
use crate::logging::LogLevel;
use console::style;
use std::path::Path;

/// Printed between a timed-out attempt and the next one.
pub fn display_retry(attempt: u32, max_attempts: u32) {
    eprintln!(
        "{}",
        style(format!(
            "Request timed out, retrying ({}/{})...",
            attempt, max_attempts
        ))
        .yellow()
    );
}

pub fn display_error(error: &AskError) {
    let text = match error {
        AskError::Network(message) => format!("Request failed: {}", message),
        other => other.to_string(),
    };
    eprintln!("{}", style(text).red());
}

pub fn display_invalid_model(model: &str, suggestion: &Suggestion) {
    println!("{}", suggestion);
    println!(
        "{} '{}' is not a valid model.",
        style("Error:").bold().red(),
        model
    );
}

pub fn display_missing_api_key() {
    eprintln!(
        "{}",
        style("API Key not found. Set OPENAI_API_KEY or use --set-api-key.").red()
    );
}

pub fn display_config_saved(path: &Path) {
    println!(
        "{} {}",
        style("Configuration saved to").green(),
        style(path.display()).bold()
    );
}

pub fn usage_hint() -> String {
    [
        "No input provided. Usage examples:",
        "  ask \"What is the capital of France?\"",
        "  ask -c \"Let's have a conversation\"",
        "  ask --help",
    ]
    .join("\n")
}

pub fn display_usage_hint() {
    println!("{}", usage_hint());
}

pub fn version_text(settings: &Settings, level: LogLevel, logfile: Option<&Path>) -> String {
    let mut lines = vec![
        format!("ask {}", env!("CARGO_PKG_VERSION")),
        format!("Model: {}", settings.model),
        format!("API Key: {}", settings.masked_api_key()),
        format!("Base URL: {}", settings.base_url),
        format!("Token Limit: {}", settings.token_limit),
        format!("Log Level: {}", level.label()),
    ];
    if let Some(path) = logfile {
        lines.push(format!("Logging to file: {}", path.display()));
    }
    lines.join("\n")
}

pub fn display_version(settings: &Settings, level: LogLevel, logfile: Option<&Path>) {
    println!("{}", version_text(settings, level, logfile));
}

pub fn display_conversation_banner(starting_fresh: bool) {
    if starting_fresh {
        println!("{}", style("Starting conversation mode...").bold().cyan());
    }
    println!(
        "Type {} to quit, {} for conversation info, or {} for commands.",
        style("'exit'").bold(),
        style("'status'").bold(),
        style("'help'").bold()
    );
}

/// Output of a conversation command.
pub fn display_command_output(output: &str) {
    println!("{}", output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_hint_lists_examples() {
        let hint = usage_hint();
        assert!(hint.starts_with("No input provided."));
        assert!(hint.contains("ask -c"));
    }

    #[test]
    fn version_text_masks_key() {
        let settings = Settings {
            api_key: "sk-1234567890abcdef".into(),
            ..Settings::default()
        };
        let text = version_text(&settings, LogLevel::Info, Some(Path::new("/tmp/ask.log")));
        assert!(text.contains("API Key: sk-1***********cdef"));
        assert!(!text.contains("567890"));
        assert!(text.contains("Token Limit: 128000"));
        assert!(text.contains("Log Level: INFO"));
        assert!(text.ends_with("Logging to file: /tmp/ask.log"));
    }
}
