pub mod admin;
pub mod ai;
pub mod config;
pub mod contact;
pub mod orcid;
pub mod search;
pub mod seed;
pub mod sources;

use crate::cli::Cli;
use medmatch_core::config::StoreBackend;
use medmatch_core::{AppConfig, MatchError, RecordStore};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Core(#[from] MatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Configuration and the store shared by every component of one invocation.
pub struct Context {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = AppConfig::load_with_env(cli.config.as_deref())?;
        if config.store.backend == StoreBackend::Memory {
            tracing::debug!("using the in-memory store; nothing is persisted after this command");
        }
        let store = config.open_store();
        Ok(Self { config, store })
    }
}
