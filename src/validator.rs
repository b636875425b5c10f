//! Validation of untrusted model output into [`Bullets`].
//!
//! The model is treated as a free-form text generator. Nothing it returns is
//! trusted until it has been parsed and checked against the five-bullet schema.

use crate::gateway::{FinishReason, GenerateContentResponse};
use crate::summary::{Bullets, BulletsError, BULLET_COUNT};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response contained no candidates")]
    NoCandidates,
    #[error("response text was empty")]
    EmptyResponse,
    #[error("response is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("response does not match the bullet schema: {0}")]
    SchemaValidation(String),
}

/// A payload that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSummary {
    /// Trimmed text exactly as the model produced it
    pub raw: String,
    pub bullets: Bullets,
    /// True when the model hit its token limit
    pub truncated: bool,
}

/// Run every check on `response`, first failure wins.
pub fn validate(response: &GenerateContentResponse) -> Result<ValidatedSummary, ValidationError> {
    let Some(candidate) = response.candidates.first() else {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!(block_reason = reason, "prompt was blocked by the provider");
        }
        return Err(ValidationError::NoCandidates);
    };

    let raw = candidate.text().trim().to_string();
    if raw.is_empty() {
        return Err(ValidationError::EmptyResponse);
    }

    let truncated = match candidate.finish_reason() {
        Some(FinishReason::Stop) => false,
        Some(FinishReason::MaxTokens) => {
            warn!("response was truncated due to token limit");
            true
        }
        Some(FinishReason::Other(reason)) => {
            warn!(finish_reason = %reason, "unexpected finish reason");
            false
        }
        None => {
            warn!("response carried no finish reason");
            false
        }
    };

    let bullets = parse_bullets(&raw).map_err(|e| with_payload(e, &raw))?;
    Ok(ValidatedSummary {
        raw,
        bullets,
        truncated,
    })
}

/// Parse `text` as `{"bullets": [..5 strings..]}`.
pub fn parse_bullets(text: &str) -> Result<Bullets, ValidationError> {
    let json = strip_markdown_json(text);
    if json.len() != text.trim().len() {
        debug!("unwrapped fenced JSON payload");
    }

    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let items = value
        .get("bullets")
        .ok_or_else(|| ValidationError::SchemaValidation("missing `bullets` field".into()))?
        .as_array()
        .ok_or_else(|| ValidationError::SchemaValidation("`bullets` is not an array".into()))?;

    if items.len() != BULLET_COUNT {
        return Err(ValidationError::SchemaValidation(
            BulletsError::WrongCount(items.len()).to_string(),
        ));
    }

    let strings = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ValidationError::SchemaValidation(format!("bullet {} is not a string", i + 1))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Bullets::try_from(strings).map_err(|e| ValidationError::SchemaValidation(e.to_string()))
}

/// Append the offending model output to the error detail for operators.
fn with_payload(err: ValidationError, payload: &str) -> ValidationError {
    match err {
        ValidationError::MalformedJson(d) => {
            ValidationError::MalformedJson(format!("{d}; payload: {payload}"))
        }
        ValidationError::SchemaValidation(d) => {
            ValidationError::SchemaValidation(format!("{d}; payload: {payload}"))
        }
        other => other,
    }
}

/// Strip markdown code block wrappers from a JSON response
fn strip_markdown_json(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);

    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => trimmed,
    }
}
