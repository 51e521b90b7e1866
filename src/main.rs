use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};

mod app;
mod attachments;
mod catalog;
mod cli;
mod commands;
mod config;
mod conversation;
mod core;
mod dispatcher;
mod display;
mod input;
mod logging;
mod progress;
mod providers;
mod stream;

use crate::app::Application;
use crate::catalog::ModelCatalog;
use crate::cli::Args;
use crate::config::{Config, Environment, Settings};
use crate::conversation::{Message, Role, estimate_tokens};
use crate::core::error::AskError;
use crate::logging::LogLevel;
use crate::providers::OpenAIProvider;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let env = Environment::load();

    let level = logging::resolve_level(
        args.log,
        args.debug,
        std::env::var(logging::LOG_ENV_VAR).ok().as_deref(),
    );
    if let Err(e) = logging::init(level, args.logfile.as_deref()) {
        eprintln!("{}", e);
    }

    match run(args, env, level).await {
        Ok(code) => code,
        // Already explained to the user alongside the suggestion.
        Err(AskError::InvalidModel(model)) => {
            error!("Invalid model: {}", model);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            display::display_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, env: Environment, level: LogLevel) -> Result<ExitCode, AskError> {
    let mut config = Config::load()?;

    if args.set_api_key.is_some() || args.set_model.is_some() {
        if let Some(key) = &args.set_api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(model) = &args.set_model {
            config.model = Some(model.clone());
        }
        config.save()?;
        display::display_config_saved(&Config::config_path());
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::resolve(&config, &env, &args);
    debug!(
        "Resolved settings: model={}, base_url={}, token_limit={}, temperature={}",
        settings.model, settings.base_url, settings.token_limit, settings.temperature
    );

    if args.version {
        display::display_version(&settings, level, args.logfile.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let query = app::compose_query(args.query_text(), app::read_piped_stdin()?);

    if args.token_count {
        match &query {
            Some(text) => println!(
                "{}",
                estimate_tokens(&[Message::new(Role::User, text.as_str())])
            ),
            None => display::display_usage_hint(),
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !settings.has_api_key() {
        display::display_missing_api_key();
        return Ok(ExitCode::FAILURE);
    }

    if query.is_none() && !settings.conversation_mode {
        display::display_usage_hint();
        return Ok(ExitCode::SUCCESS);
    }

    let provider = OpenAIProvider::with_endpoint(&settings.base_url, &settings.api_key)?;
    let catalog = ModelCatalog::new(ModelCatalog::default_path());
    let mut app = Application::new(settings, Box::new(provider), catalog);
    app.run(query).await?;

    Ok(ExitCode::SUCCESS)
}
