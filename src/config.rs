use crate::cli::Args;
use crate::core::error::AskError;
use crate::providers::openai::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gpt-5.2-chat-latest";
pub const DEFAULT_TOKEN_LIMIT: usize = 128_000;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "ASK_GLOBAL_MODEL";
pub const BASE_URL_VAR: &str = "ASK_BASE_URL";

/// Persisted settings in `~/.ask/config.yaml`. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ask")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn history_path() -> PathBuf {
        Self::config_dir().join("input_history.txt")
    }

    pub fn load() -> Result<Config, AskError> {
        Self::load_from(&Self::config_path())
    }

    /// A missing file is an empty config; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Config, AskError> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str::<Config>(&contents)
            .map_err(|e| AskError::Config(format!("Parse {}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<(), AskError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AskError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }
}

/// Values taken from the process environment (after `.env` is applied).
#[derive(Debug, Default, Clone)]
pub struct Environment {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Environment {
    /// Loads `.env` from the working directory, without overriding variables
    /// that are already set, then reads the relevant variables.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => debug!("Ignoring .env: {}", e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            api_key: read(API_KEY_VAR),
            model: read(MODEL_VAR),
            base_url: read(BASE_URL_VAR),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub token_limit: usize,
    pub temperature: f64,
    pub streaming_enabled: bool,
    pub conversation_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token_limit: DEFAULT_TOKEN_LIMIT,
            temperature: DEFAULT_TEMPERATURE,
            streaming_enabled: true,
            conversation_mode: false,
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then the environment, then flags.
    pub fn resolve(config: &Config, env: &Environment, args: &Args) -> Self {
        let defaults = Settings::default();

        let pick = |flag: &Option<String>, env: &Option<String>, file: &Option<String>| {
            flag.clone().or_else(|| env.clone()).or_else(|| file.clone())
        };

        Self {
            api_key: pick(&args.token, &env.api_key, &config.api_key).unwrap_or_default(),
            model: pick(&args.model, &env.model, &config.model).unwrap_or(defaults.model),
            base_url: pick(&args.base_url, &env.base_url, &config.base_url)
                .unwrap_or(defaults.base_url),
            token_limit: args
                .token_limit
                .or(config.token_limit)
                .unwrap_or(defaults.token_limit),
            temperature: args
                .temperature
                .or(config.temperature)
                .unwrap_or(defaults.temperature),
            streaming_enabled: !args.no_stream,
            conversation_mode: args.continue_mode,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The key with everything but its first and last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ask").chain(list.iter().copied())).unwrap()
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::resolve(&Config::default(), &Environment::default(), &args(&[]));
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.token_limit, 128_000);
        assert_eq!(settings.temperature, 1.0);
        assert!(settings.streaming_enabled);
        assert!(!settings.conversation_mode);
        assert!(!settings.has_api_key());
    }

    #[test]
    fn later_sources_win() {
        let config = Config {
            api_key: Some("file-key".into()),
            model: Some("file-model".into()),
            token_limit: Some(4000),
            ..Config::default()
        };
        let env = env(&[(API_KEY_VAR, "env-key"), (MODEL_VAR, "env-model")]);

        let settings = Settings::resolve(&config, &env, &args(&[]));
        assert_eq!(settings.api_key, "env-key");
        assert_eq!(settings.model, "env-model");
        assert_eq!(settings.token_limit, 4000);

        let settings = Settings::resolve(
            &config,
            &env,
            &args(&["-t", "flag-key", "-m", "flag-model", "-l", "50", "--no-stream", "-c"]),
        );
        assert_eq!(settings.api_key, "flag-key");
        assert_eq!(settings.model, "flag-model");
        assert_eq!(settings.token_limit, 50);
        assert!(!settings.streaming_enabled);
        assert!(settings.conversation_mode);
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let env = env(&[(API_KEY_VAR, "  "), (BASE_URL_VAR, "http://localhost:8080/v1")]);
        assert_eq!(env.api_key, None);
        assert_eq!(env.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }

    #[test]
    fn masks_api_key() {
        let settings = Settings {
            api_key: "sk-abcdefghijklmnop".into(),
            ..Settings::default()
        };
        assert_eq!(settings.masked_api_key(), "sk-a***********mnop");

        let short = Settings {
            api_key: "short".into(),
            ..Settings::default()
        };
        assert_eq!(short.masked_api_key(), "*****");
    }

    #[test]
    fn config_round_trips_through_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = Config {
            api_key: Some("sk-test".into()),
            model: Some("gpt-4o".into()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("api_key: sk-test"));
        assert!(!text.contains("base_url"));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn missing_or_empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        fs::write(&path, "\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "token_limit: [not, a, number]\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AskError::Config(_))));
    }
}
