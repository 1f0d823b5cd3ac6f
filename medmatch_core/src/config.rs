//! Application configuration.
//!
//! Loaded from TOML at `~/.config/medmatch/config.toml` (or an explicit
//! path). Every section has defaults, so a missing file is a valid
//! configuration. Credentials may also come from the environment, which
//! wins over the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assembler::SourceLimits;
use crate::dedupe::DedupeStrategy;
use crate::error::MatchError;
use crate::record::{Source, MAX_SOURCE_LIMIT};
use crate::store::{FileStore, MemoryStore, RecordStore};
use crate::taxonomy::TermTaxonomy;

/// Per-source deadline in milliseconds (default: 10s).
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Environment variable that points the file backend at a store path.
pub const STORE_ENV: &str = "MEDMATCH_STORE";

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// JSON file for the file backend (default: `~/.local/share/medmatch/store.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hard per-source deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub dedupe: DedupeStrategy,

    /// Return a single mock-fallback trial when a trial search comes back empty
    #[serde(default)]
    pub fallback_when_empty: bool,

    /// YAML term taxonomy replacing the built-in table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy_path: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            dedupe: DedupeStrategy::default(),
            fallback_when_empty: false,
            taxonomy_path: None,
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

/// What a source does when its credential is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Produce clearly labelled placeholder records.
    Placeholder,
    /// Contribute nothing.
    Skip,
}

/// One `[sources.<tag>]` table. Unset fields fall back to per-source
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_key: Option<MissingKeyPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Fully resolved settings for one external source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub source: Source,
    pub enabled: bool,
    pub limit: usize,
    pub missing_key: MissingKeyPolicy,
    pub api_key: Option<String>,
}

impl SourceSettings {
    pub fn defaults(source: Source) -> Self {
        let limit = match source {
            Source::Pubmed | Source::Clinicaltrials | Source::Scholar => 3,
            Source::Orcid | Source::Researchgate => 2,
            Source::Local | Source::MockFallback => usize::MAX,
        };
        Self {
            source,
            enabled: true,
            limit,
            missing_key: MissingKeyPolicy::Placeholder,
            api_key: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Environment variable carrying a source's credential.
pub fn credential_env(source: Source) -> Option<&'static str> {
    match source {
        Source::Pubmed => Some("NCBI_API_KEY"),
        Source::Orcid => Some("ORCID_CLIENT_ID"),
        Source::Scholar => Some("SERPAPI_KEY"),
        Source::Researchgate => Some("RESEARCHGATE_API_KEY"),
        Source::Local | Source::Clinicaltrials | Source::MockFallback => None,
    }
}

// ============================================================================
// Assistant
// ============================================================================

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Keyed by source tag (`pubmed`, `orcid`, ...)
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// `~/.config/medmatch/config.toml`
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medmatch").join("config.toml")
    }

    pub fn from_toml(content: &str) -> Result<Self, MatchError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| MatchError::Config(e.to_string()))?;
        for (tag, source) in &config.sources {
            if Source::parse(tag).is_none() {
                return Err(MatchError::Config(format!("unknown source '{}'", tag)));
            }
            if source.limit.is_some_and(|l| l > MAX_SOURCE_LIMIT) {
                return Err(MatchError::Config(format!(
                    "sources.{}.limit must be at most {}",
                    tag, MAX_SOURCE_LIMIT
                )));
            }
        }
        Ok(config)
    }

    /// Read `path`. A file that does not exist yields the defaults.
    pub fn load(path: &Path) -> Result<Self, MatchError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load from `path` (or the default location) and apply the process
    /// environment.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, MatchError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::load(&Self::default_path())?,
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Overlay credentials and the store path from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for source in Source::ALL {
            if let Some(key) = credential_env(source).and_then(lookup) {
                self.sources
                    .entry(source.as_str().to_string())
                    .or_default()
                    .api_key = Some(key);
            }
        }

        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_AI_API_KEY")) {
            self.assistant.api_key = Some(key);
        }

        if let Some(path) = lookup(STORE_ENV) {
            self.store.backend = StoreBackend::File;
            self.store.path = Some(PathBuf::from(path));
        }
    }

    /// Resolved settings for `source`.
    pub fn source(&self, source: Source) -> SourceSettings {
        let mut settings = SourceSettings::defaults(source);
        if let Some(entry) = self.sources.get(source.as_str()) {
            if let Some(enabled) = entry.enabled {
                settings.enabled = enabled;
            }
            if let Some(limit) = entry.limit {
                settings.limit = limit.min(MAX_SOURCE_LIMIT);
            }
            if let Some(policy) = entry.missing_key {
                settings.missing_key = policy;
            }
            settings.api_key = entry.api_key.clone();
        }
        settings
    }

    /// Per-source limits for the assembler. Local stays unlimited.
    pub fn limits(&self) -> SourceLimits {
        let mut limits = SourceLimits::new();
        for source in Source::ALL {
            if source.is_local() || source == Source::MockFallback {
                continue;
            }
            limits.set(source, self.source(source).limit);
        }
        limits
    }

    /// Open the configured record store.
    pub fn open_store(&self) -> Arc<dyn RecordStore> {
        match self.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => match &self.store.path {
                Some(path) => Arc::new(FileStore::new(path)),
                None => Arc::new(FileStore::new_default()),
            },
        }
    }

    /// The term taxonomy from `search.taxonomy_path`, or the built-in one.
    pub fn taxonomy(&self) -> Result<TermTaxonomy, MatchError> {
        match &self.search.taxonomy_path {
            Some(path) => {
                let taxonomy = TermTaxonomy::from_path(path)?;
                tracing::debug!(path = %path.display(), "loaded term taxonomy");
                Ok(taxonomy)
            }
            None => Ok(TermTaxonomy::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, MatchError> {
        toml::to_string_pretty(self).map_err(|e| MatchError::Config(e.to_string()))
    }
}
