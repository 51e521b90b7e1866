//! Local cache of the model identifiers the endpoint accepts.
//!
//! The catalog is persisted as `{"timestamp": .., "models": [{"id", "created"}]}`
//! and considered fresh for 24 hours. Validation is fail-open: when no catalog
//! can be loaded or fetched, every model is accepted.

use crate::providers::LLMProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const CACHE_EXPIRY_SECS: i64 = 86_400;
pub const CACHE_FILE_NAME: &str = "ask_models_cache.json";

/// Largest edit distance still offered as "did you mean".
pub const SUGGESTION_MAX_DISTANCE: usize = 5;

pub const FALLBACK_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub created: i64,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            created,
        }
    }
}

/// Reads one `{"id", "created"}` entry. Entries without a string id are
/// skipped; a missing `created` is replaced by `fallback_created` if given.
pub fn model_from_value(value: &Value, fallback_created: Option<i64>) -> Option<ModelInfo> {
    let id = value.get("id")?.as_str()?;
    let created = match value.get("created").and_then(Value::as_f64) {
        Some(created) => created as i64,
        None => fallback_created?,
    };
    Some(ModelInfo::new(id, created))
}

#[derive(Serialize)]
struct CacheFile<'a> {
    timestamp: i64,
    models: &'a [ModelInfo],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The model is in the catalog.
    Valid,
    /// No catalog could be obtained, so the model was not checked.
    Unverified,
    /// The catalog does not know the model.
    Invalid(Suggestion),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Validation::Invalid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    DidYouMean {
        requested: String,
        candidate: String,
        distance: usize,
    },
    Fallback {
        requested: String,
    },
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::DidYouMean {
                requested,
                candidate,
                ..
            } => write!(
                f,
                "Model '{}' not found. Did you mean '{}'?",
                requested, candidate
            ),
            Suggestion::Fallback { requested } => write!(
                f,
                "Model '{}' not found. Available models include: {}",
                requested,
                FALLBACK_MODELS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
    last_updated: i64,
    path: PathBuf,
}

impl ModelCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            models: Vec::new(),
            last_updated: 0,
            path: path.into(),
        }
    }

    /// `<user cache dir>/ask_models_cache.json`
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CACHE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    #[cfg(test)]
    pub fn last_updated(&self) -> i64 {
        self.last_updated
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    /// Replaces the whole catalog. Later duplicates of an id are dropped.
    pub fn replace(&mut self, models: Vec<ModelInfo>, updated_at: i64) {
        let mut seen = HashSet::new();
        self.models = models
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        self.last_updated = updated_at;
    }

    pub fn is_fresh_at(&self, now: i64) -> bool {
        now - self.last_updated <= CACHE_EXPIRY_SECS
    }

    /// Loads the persisted catalog. Returns `false` (leaving the in-memory
    /// catalog untouched) when the file is missing, unparsable, stale or empty.
    pub fn load(&mut self) -> bool {
        self.load_at(now())
    }

    pub fn load_at(&mut self, now: i64) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No models cache file at {}", self.path.display());
                return false;
            }
        };

        if content.trim().is_empty() {
            warn!("Empty models cache file");
            return false;
        }

        let root: Value = match serde_json::from_str(&content) {
            Ok(root) => root,
            Err(e) => {
                warn!("Failed to parse models cache file: {}", e);
                return false;
            }
        };

        let Some(timestamp) = root.get("timestamp").and_then(Value::as_f64) else {
            warn!("Invalid timestamp in models cache");
            return false;
        };
        let timestamp = timestamp as i64;

        if now - timestamp > CACHE_EXPIRY_SECS {
            info!("Models cache is expired (older than 24 hours)");
            return false;
        }

        let Some(entries) = root.get("models").and_then(Value::as_array) else {
            warn!("Invalid models array in cache");
            return false;
        };

        let models: Vec<ModelInfo> = entries
            .iter()
            .filter_map(|entry| model_from_value(entry, None))
            .collect();

        if models.is_empty() {
            debug!("Models cache holds no usable entries");
            return false;
        }

        self.replace(models, timestamp);
        info!("Loaded {} models from cache", self.models.len());
        true
    }

    /// Persists the catalog. Failures are logged, never propagated.
    pub fn save(&self) -> bool {
        if self.models.is_empty() {
            warn!("No models to save to cache");
            return false;
        }

        let file = CacheFile {
            timestamp: self.last_updated,
            models: &self.models,
        };
        let json = match serde_json::to_string_pretty(&file) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize models cache: {}", e);
                return false;
            }
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create cache directory {}: {}", parent.display(), e);
                    return false;
                }
            }
        }

        match fs::write(&self.path, json) {
            Ok(()) => {
                info!("Saved {} models to cache", self.models.len());
                true
            }
            Err(e) => {
                error!("Failed to write models cache {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Refreshes the catalog from the endpoint. On failure the in-memory
    /// catalog is left as it was.
    pub async fn fetch(&mut self, provider: &dyn LLMProvider) -> bool {
        info!("Fetching available models");
        match provider.list_models().await {
            Ok(models) => {
                self.replace(models, now());
                info!("Fetched {} models", self.models.len());
                self.save();
                !self.models.is_empty()
            }
            Err(e) => {
                warn!("Failed to fetch models: {}", e);
                false
            }
        }
    }

    pub async fn validate(&mut self, model: &str, provider: &dyn LLMProvider) -> Validation {
        if !self.is_empty() && self.is_fresh_at(now()) {
            debug!("Model catalog already loaded");
        } else if !self.load() && !self.fetch(provider).await {
            debug!("Could not refresh the model catalog");
        }

        if self.is_empty() {
            warn!("No model catalog available, continuing without validation");
            return Validation::Unverified;
        }

        if self.contains(model) {
            debug!("Model '{}' is valid", model);
            return Validation::Valid;
        }

        let suggestion = self.suggest(model);
        if let Suggestion::DidYouMean {
            candidate,
            distance,
            ..
        } = &suggestion
        {
            info!(
                "Suggested alternative model: {} (distance: {})",
                candidate, distance
            );
        }
        Validation::Invalid(suggestion)
    }

    pub fn suggest(&self, model: &str) -> Suggestion {
        let closest = self
            .models
            .iter()
            .map(|m| (edit_distance(model, &m.id), &m.id))
            .min_by_key(|(distance, _)| *distance);

        match closest {
            Some((distance, candidate)) if distance <= SUGGESTION_MAX_DISTANCE => {
                Suggestion::DidYouMean {
                    requested: model.to_string(),
                    candidate: candidate.clone(),
                    distance,
                }
            }
            _ => Suggestion::Fallback {
                requested: model.to_string(),
            },
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Levenshtein distance with unit cost for insert, delete and substitute.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
