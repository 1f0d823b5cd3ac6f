//! Generative-language helpers for patients and researchers.
//!
//! Every call is best effort: when no model is configured, the call fails,
//! or it returns no usable text, a fixed fallback string is returned.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AssistantConfig;
use crate::error::MatchError;
use crate::utils::{check_status, http_client};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const QUESTION_WORDS: [&str; 12] = [
    "what", "how", "why", "when", "where", "can", "should", "is", "are", "hi", "hello", "help",
];

const QUESTION_FALLBACK: &str = "I'm here to help with medical questions and finding researchers. What specific condition or research area interests you?";
const EMPTY_ANSWER_FALLBACK: &str = "I can help you with medical questions. Please consult with your healthcare provider for specific medical advice.";
const GENERIC_RESEARCH_FALLBACK: &str =
    "I can help with research collaboration and academic questions. What would you like to know?";
const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "Consider interdisciplinary collaborations",
    "Explore international partnerships",
    "Join research networks in your field",
];

/// A text-in, text-out completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, MatchError>;
}

/// Google Gemini `generateContent`.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, MatchError> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Text of `candidates[0].content.parts[]`, joined by newlines.
pub fn candidate_text(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");
    Some(text)
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, MatchError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = json!({
            "contents": [ { "role": "user", "parts": [ { "text": prompt } ] } ]
        });
        let response = self.client.post(&url).json(&body).send().await?;
        let value: Value = check_status("gemini", response)?.json().await?;
        candidate_text(&value).ok_or_else(|| MatchError::Parse("Gemini response had no candidates".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionAnalysis {
    /// The extracted condition, or the answer when the input was a question.
    pub primary_condition: String,
    pub identified_conditions: Vec<String>,
}

/// Input for research suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProfile {
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    /// When present, answer this instead of suggesting collaborations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// Questions contain '?' or start with a question or greeting word.
pub fn is_question(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let first = first
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    QUESTION_WORDS.contains(&first.as_str())
}

/// Bullet lines of a completion, markers stripped, at most three.
pub fn split_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().trim_matches(|c: char| c == '-' || c == '•' || c == '*' || c == ' ').trim())
        .filter(|line| !line.is_empty())
        .take(3)
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Default)]
pub struct Assistant {
    model: Option<Arc<dyn LanguageModel>>,
}

impl Assistant {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model: Some(model) }
    }

    /// An assistant that only ever returns fallbacks.
    pub fn offline() -> Self {
        Self { model: None }
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self, MatchError> {
        match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Ok(Self::new(Arc::new(GeminiClient::new(key, &config.model)?))),
            None => {
                debug!("no assistant api key configured; using fallbacks");
                Ok(Self::offline())
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.model.is_some()
    }

    /// Trimmed completion, or `None` on any failure or empty output.
    async fn complete(&self, prompt: &str) -> Option<String> {
        let model = self.model.as_ref()?;
        match model.generate(prompt).await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                warn!(error = %e, "language model call failed");
                None
            }
        }
    }

    pub async fn analyze_condition(&self, text: &str) -> ConditionAnalysis {
        let text = text.trim();
        if is_question(text) {
            let answer = match &self.model {
                None => QUESTION_FALLBACK.to_string(),
                Some(model) => {
                    let prompt = format!(
                        "Answer this medical question in simple terms for a patient: '{}'. Be helpful but remind them to consult healthcare professionals. Keep response under 100 words.",
                        text
                    );
                    match model.generate(&prompt).await {
                        Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
                        Ok(_) => EMPTY_ANSWER_FALLBACK.to_string(),
                        Err(e) => {
                            warn!(error = %e, "language model call failed");
                            QUESTION_FALLBACK.to_string()
                        }
                    }
                }
            };
            return ConditionAnalysis {
                primary_condition: answer,
                identified_conditions: vec![text.to_string()],
            };
        }

        let prompt = format!(
            "Extract the primary medical condition from this text: '{}'. Return only the main condition name in simple terms.",
            text
        );
        let condition = self
            .complete(&prompt)
            .await
            .unwrap_or_else(|| text.to_string());
        ConditionAnalysis {
            primary_condition: condition.clone(),
            identified_conditions: vec![condition],
        }
    }

    pub async fn trial_summary(&self, title: &str, description: &str) -> String {
        let prompt = format!(
            "Explain this clinical trial in simple terms for patients: {} - {}. Keep it under 200 words and be encouraging but honest.",
            title, description
        );
        self.complete(&prompt).await.unwrap_or_else(|| {
            format!(
                "This trial studies {}. Contact the research team for more details.",
                title
            )
        })
    }

    pub async fn research_suggestions(&self, profile: &ResearchProfile) -> Vec<String> {
        let fallback = || {
            if profile.specialties.is_empty() {
                vec![GENERIC_RESEARCH_FALLBACK.to_string()]
            } else {
                vec![format!(
                    "I can help with research in {}. What specific research challenge are you facing?",
                    profile.specialties.join(", ")
                )]
            }
        };
        if self.model.is_none() {
            return fallback();
        }

        let specialties = profile.specialties.join(", ");
        let interests = profile.research_interests.join(", ");

        if let Some(question) = profile.question.as_deref() {
            let prompt = format!(
                "Answer this research question: '{}' for a researcher with specialties: {} and interests: {}. Provide helpful advice in 2-3 sentences.",
                question, specialties, interests
            );
            return self.complete(&prompt).await.map(|a| vec![a]).unwrap_or_else(fallback);
        }

        let prompt = format!(
            "Suggest 3 research collaboration ideas for a researcher with specialties: {} and interests: {}. List them as bullet points.",
            specialties, interests
        );
        match self.complete(&prompt).await.map(|t| split_suggestions(&t)) {
            Some(suggestions) if !suggestions.is_empty() => suggestions,
            _ => DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
