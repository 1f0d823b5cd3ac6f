// src/error.rs
use crate::store::StoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Upstream {source_name} returned {status}")]
    UpstreamStatus { source_name: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Missing credential for {0}")]
    MissingCredential(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchError {
    pub fn code_str(&self) -> &'static str {
        match self {
            MatchError::InvalidInput(_) => "invalid_input",
            MatchError::NotFound { .. } => "not_found",
            MatchError::Timeout(_) => "timeout",
            MatchError::HttpRequest(_) | MatchError::UpstreamStatus { .. } => "upstream_error",
            MatchError::Parse(_) | MatchError::SerdeJson(_) => "parse_error",
            MatchError::Store(_) => "store_error",
            MatchError::Config(_) | MatchError::Yaml(_) | MatchError::MissingCredential(_) => {
                "config_error"
            }
            MatchError::Io(_) | MatchError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error was caused by the caller rather than by an upstream
    /// or local failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MatchError::InvalidInput(_) | MatchError::NotFound { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code_str(),
            "message": self.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
