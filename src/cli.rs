use crate::logging::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "ask",
    author,
    about = "Chat with OpenAI-compatible models from the command line",
    long_about = None,
    disable_version_flag = true
)]
pub struct Args {
    /// Text to send; several words are joined with spaces. `@file` attaches a file
    pub query: Vec<String>,

    /// Conversation mode: keep chatting after the first reply
    #[arg(short = 'c', long = "continue")]
    pub continue_mode: bool,

    /// Wait for the complete response instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// API key for this invocation
    #[arg(short = 't', long = "token", value_name = "TOKEN")]
    pub token: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short = 'T', long, value_parser = parse_temperature)]
    pub temperature: Option<f64>,

    /// Conversation token budget
    #[arg(short = 'l', long = "token-limit", alias = "tokenLimit", value_name = "NUM")]
    pub token_limit: Option<usize>,

    /// Print the estimated token count of the query and exit
    #[arg(long = "token-count", alias = "tokenCount")]
    pub token_count: bool,

    /// Print the active settings and exit
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log level
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log: Option<LogLevel>,

    /// Append logs to FILE instead of stderr
    #[arg(long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Save the API key to the config file and exit
    #[arg(long = "set-api-key", alias = "setAPIKey", value_name = "KEY")]
    pub set_api_key: Option<String>,

    /// Save the default model to the config file and exit
    #[arg(long = "set-model", alias = "setModel", value_name = "MODEL")]
    pub set_model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

impl Args {
    /// The positional words joined into one query, if any were given.
    pub fn query_text(&self) -> Option<String> {
        let text = self.query.join(" ");
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

fn parse_temperature(value: &str) -> Result<f64, String> {
    let temperature: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=2.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(format!("{} is outside 0.0-2.0", temperature))
    }
}
