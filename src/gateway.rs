//! Gemini `generateContent` gateway.
//!
//! Issues exactly one request per call with fixed decoding parameters and
//! permissive safety thresholds. Retries, streaming and timeouts are left to
//! the caller and the transport.

use crate::config::{Config, ConfigError, GenerationConfig};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network failure, or a non-2xx reply without a structured error body.
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider answered with an `error` object (quota, invalid key, ...).
    #[error("{0}")]
    Provider(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Harm categories covered by the request's safety settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmCategory {
    HarmCategoryHarassment,
    HarmCategoryHateSpeech,
    HarmCategorySexuallyExplicit,
    HarmCategoryDangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Every category at the most permissive threshold.
pub fn permissive_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::HarmCategoryHarassment,
        HarmCategory::HarmCategoryHateSpeech,
        HarmCategory::HarmCategorySexuallyExplicit,
        HarmCategory::HarmCategoryDangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodingParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub candidate_count: u32,
}

impl From<&GenerationConfig> for DecodingParams {
    fn from(cfg: &GenerationConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
            top_k: cfg.top_k,
            top_p: cfg.top_p,
            // Only the first candidate is ever read.
            candidate_count: 1,
        }
    }
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: DecodingParams,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    pub fn new(prompt: String, generation: &GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
                role: None,
            }],
            generation_config: DecodingParams::from(generation),
            safety_settings: permissive_safety_settings(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Other(String),
}

impl From<&str> for FinishReason {
    fn from(raw: &str) -> Self {
        match raw {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason.as_deref().map(FinishReason::from)
    }

    /// All text fragments of the candidate joined in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Raw provider reply. Nothing here has been validated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub error: Option<ProviderErrorBody>,
}

impl GenerateContentResponse {
    /// Convenience constructor for a single-candidate text reply.
    pub fn from_text(text: impl Into<String>, finish_reason: Option<&str>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                    role: Some("model".to_string()),
                }),
                finish_reason: finish_reason.map(str::to_string),
            }],
            ..Default::default()
        }
    }
}

/// A remote text-generation model.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, prompt: String) -> Result<GenerateContentResponse, GatewayError>;
}

/// reqwest-backed client for the Gemini REST API.
pub struct GeminiGateway {
    client: Client,
    url: Url,
    generation: GenerationConfig,
}

impl GeminiGateway {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let api_key = config.api_key()?;
        let url = Self::endpoint_url(&config.agent.endpoint, &config.agent.model, api_key)?;
        let client = Client::builder()
            .user_agent(concat!("precis/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url,
            generation: config.generation.clone(),
        })
    }

    /// `{endpoint}/models/{model}:generateContent?key={api_key}`
    pub fn endpoint_url(endpoint: &str, model: &str, api_key: &str) -> Result<Url, GatewayError> {
        let base = format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        );
        Url::parse_with_params(&base, &[("key", api_key)])
            .map_err(|e| GatewayError::Transport(format!("invalid endpoint {base}: {e}")))
    }
}

/// Interpret a provider reply given its HTTP status and raw body.
pub fn interpret_reply(status: u16, body: &str) -> Result<GenerateContentResponse, GatewayError> {
    let success = (200..300).contains(&status);
    let parsed = serde_json::from_str::<GenerateContentResponse>(body);

    match parsed {
        Ok(GenerateContentResponse {
            error: Some(err), ..
        }) => {
            error!(status, code = ?err.code, provider_status = ?err.status, "provider returned an error");
            Err(GatewayError::Provider(
                err.message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Failed to generate summary".to_string()),
            ))
        }
        Ok(response) if success => Ok(response),
        Ok(_) => Err(GatewayError::Transport(format!("HTTP {status}"))),
        Err(e) => {
            debug!(status, body, "unparseable provider reply");
            if success {
                Err(GatewayError::Transport(format!("unreadable response body: {e}")))
            } else {
                Err(GatewayError::Transport(format!("HTTP {status}")))
            }
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(&self, prompt: String) -> Result<GenerateContentResponse, GatewayError> {
        let request = GenerateContentRequest::new(prompt, &self.generation);

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        interpret_reply(status, &body)
    }
}
