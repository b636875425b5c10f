//! Summarisation pipeline.
//!
//! Builds the prompt, calls the model gateway once, validates the reply and
//! persists the outcome. A record is appended only after the reply has passed
//! validation, so the store never holds a summary that the caller rejected.

pub use crate::summary::Bullets;

use crate::gateway::{GatewayError, ModelGateway};
use crate::prompt::{build_prompt, MAX_INPUT_CHARS};
use crate::storage::{NewSummaryRecord, StorageError, SummaryStore};
use crate::validator::{validate, ValidationError};
use thiserror::Error;
use tracing::{debug, error, info};

/// Every way a single generation attempt can fail.
///
/// `Display` is the message shown to the end user. Detail goes to the log.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Failed to reach the summarization service")]
    Transport(String),
    #[error("{0}")]
    Provider(String),
    #[error("No response from API")]
    NoCandidates,
    #[error("Empty summary received")]
    EmptyResponse,
    #[error("Gemini returned invalid JSON")]
    MalformedJson(String),
    #[error("Model did not return exactly 5 bullet points")]
    SchemaValidation(String),
    #[error("Failed to save summary")]
    Persistence(#[from] StorageError),
    #[error("Summarization service is not configured")]
    Config(String),
}

impl AgentError {
    /// Short stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::InvalidInput(_) => "invalid_input",
            AgentError::Transport(_) => "transport",
            AgentError::Provider(_) => "provider",
            AgentError::NoCandidates => "no_candidates",
            AgentError::EmptyResponse => "empty_response",
            AgentError::MalformedJson(_) => "malformed_json",
            AgentError::SchemaValidation(_) => "schema_validation",
            AgentError::Persistence(_) => "persistence",
            AgentError::Config(_) => "config",
        }
    }

    /// Operator-facing detail, including the model output when it failed
    /// validation. Never shown to the end user.
    pub fn detail(&self) -> String {
        match self {
            AgentError::Transport(d)
            | AgentError::Config(d)
            | AgentError::MalformedJson(d)
            | AgentError::SchemaValidation(d) => d.clone(),
            AgentError::Persistence(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<GatewayError> for AgentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(detail) => AgentError::Transport(detail),
            GatewayError::Provider(message) => AgentError::Provider(message),
            GatewayError::Config(e) => AgentError::Config(e.to_string()),
        }
    }
}

impl From<ValidationError> for AgentError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NoCandidates => AgentError::NoCandidates,
            ValidationError::EmptyResponse => AgentError::EmptyResponse,
            ValidationError::MalformedJson(d) => AgentError::MalformedJson(d),
            ValidationError::SchemaValidation(d) => AgentError::SchemaValidation(d),
        }
    }
}

/// One user action: summarise `text` on behalf of `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    text: String,
    user_id: String,
}

impl SummaryRequest {
    /// Accepts non-blank text of at most [`MAX_INPUT_CHARS`] characters.
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Result<Self, AgentError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AgentError::InvalidInput("Text to summarize is empty".into()));
        }
        let chars = text.chars().count();
        if chars > MAX_INPUT_CHARS {
            return Err(AgentError::InvalidInput(format!(
                "Text exceeds {MAX_INPUT_CHARS} characters ({chars})"
            )));
        }
        Ok(Self {
            text,
            user_id: user_id.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Run the whole pipeline for `request`.
pub async fn summarize(
    gateway: &dyn ModelGateway,
    store: &dyn SummaryStore,
    request: &SummaryRequest,
) -> Result<Bullets, AgentError> {
    let result = run(gateway, store, request).await;
    if let Err(e) = &result {
        error!(
            kind = e.kind(),
            detail = %e.detail(),
            user_id = request.user_id(),
            "summary generation failed"
        );
    }
    result
}

async fn run(
    gateway: &dyn ModelGateway,
    store: &dyn SummaryStore,
    request: &SummaryRequest,
) -> Result<Bullets, AgentError> {
    let prompt = build_prompt(request.text());
    let response = gateway.generate(prompt).await?;
    let validated = validate(&response)?;
    debug!(payload = %validated.raw, "model output passed validation");

    let record = NewSummaryRecord::new(
        request.user_id(),
        request.text(),
        validated.bullets.clone(),
    );
    let id = store.append(record).await?;
    info!(id = %id, truncated = validated.truncated, "summary generated");

    Ok(validated.bullets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GenerateContentResponse, MockModelGateway};
    use crate::storage::MockSummaryStore;

    const FIVE: &str = r#"{"bullets":["a.","b.","c.","d.","e."]}"#;

    fn request() -> SummaryRequest {
        SummaryRequest::new("Some long article.", "user-1").unwrap()
    }

    fn gateway_returning(response: GenerateContentResponse) -> MockModelGateway {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_generate()
            .times(1)
            .returning(move |_| Ok(response.clone()));
        gateway
    }

    #[tokio::test]
    async fn valid_reply_is_persisted_once() {
        let gateway = gateway_returning(GenerateContentResponse::from_text(FIVE, Some("STOP")));
        let mut store = MockSummaryStore::new();
        store
            .expect_append()
            .withf(|r| r.user_id == "user-1" && r.original_text == "Some long article.")
            .times(1)
            .returning(|_| Ok("1".to_string()));

        let bullets = summarize(&gateway, &store, &request()).await.unwrap();
        assert_eq!(bullets.as_slice(), ["a.", "b.", "c.", "d.", "e."]);
    }

    #[tokio::test]
    async fn prompt_embeds_the_input_text() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_generate()
            .withf(|prompt| prompt.contains("Some long article."))
            .times(1)
            .returning(|_| Ok(GenerateContentResponse::from_text(FIVE, Some("STOP"))));
        let mut store = MockSummaryStore::new();
        store.expect_append().returning(|_| Ok("1".to_string()));

        assert!(summarize(&gateway, &store, &request()).await.is_ok());
    }

    #[tokio::test]
    async fn schema_violation_skips_the_store() {
        let gateway = gateway_returning(GenerateContentResponse::from_text(
            r#"{"bullets":["a.","b.","c.","d."]}"#,
            Some("STOP"),
        ));
        let mut store = MockSummaryStore::new();
        store.expect_append().times(0);

        let err = summarize(&gateway, &store, &request()).await.unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn no_candidates_skips_the_store() {
        let gateway = gateway_returning(GenerateContentResponse::default());
        let mut store = MockSummaryStore::new();
        store.expect_append().times(0);

        let err = summarize(&gateway, &store, &request()).await.unwrap_err();
        assert!(matches!(err, AgentError::NoCandidates));
        assert_eq!(err.to_string(), "No response from API");
    }

    #[tokio::test]
    async fn provider_error_message_is_passed_through() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_generate()
            .returning(|_| Err(GatewayError::Provider("Quota exceeded".to_string())));
        let mut store = MockSummaryStore::new();
        store.expect_append().times(0);

        let err = summarize(&gateway, &store, &request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Quota exceeded");
    }

    #[tokio::test]
    async fn store_failure_after_validation_is_persistence_error() {
        let gateway = gateway_returning(GenerateContentResponse::from_text(FIVE, Some("STOP")));
        let mut store = MockSummaryStore::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(StorageError::DbError(sled::Error::Unsupported("read only".into()))));

        let err = summarize(&gateway, &store, &request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Persistence(_)));
        assert_eq!(err.to_string(), "Failed to save summary");
        assert!(err.detail().contains("read only"));
    }

    #[tokio::test]
    async fn rejected_payload_is_kept_in_the_detail_only() {
        let reply = r#"{"bullets":["only one."]}"#;
        let gateway = gateway_returning(GenerateContentResponse::from_text(reply, Some("STOP")));
        let mut store = MockSummaryStore::new();
        store.expect_append().times(0);

        let err = summarize(&gateway, &store, &request()).await.unwrap_err();
        assert!(err.detail().contains(reply));
        assert!(!err.to_string().contains("only one"));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = AgentError::from(GatewayError::Config(
            crate::config::ConfigError::MissingApiKey("gemini".to_string()),
        ));
        assert_eq!(err.kind(), "config");
        assert_eq!(err.to_string(), "Summarization service is not configured");
        assert!(err.detail().contains("gemini"));
    }

    #[test]
    fn request_rejects_blank_and_oversized_text() {
        assert!(matches!(
            SummaryRequest::new("   \n", "u"),
            Err(AgentError::InvalidInput(_))
        ));
        assert!(SummaryRequest::new("x".repeat(MAX_INPUT_CHARS), "u").is_ok());
        assert!(SummaryRequest::new("x".repeat(MAX_INPUT_CHARS + 1), "u").is_err());
    }
}
