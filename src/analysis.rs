//! Analysis Client
//! Brokers one image to the hosted vision-language model and turns its
//! free-form reply into a validated `ListingSuggestion`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{Condition, ListingSuggestion};

/// Fixed instruction sent with every image.
pub const LISTING_PROMPT: &str = "Analyze this product image and provide:\n\
    - A descriptive title\n\
    - A detailed description\n\
    - Estimated price range\n\
    - Category\n\
    - Condition assessment\n\
    Return as JSON with fields: title, description, price_avg, category_id, condition";

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Transport / HTTP / missing credential failure.
    #[error("analysis unavailable: {0}")]
    Unavailable(String),
    /// The model reply contained no parseable JSON object.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    /// A required suggestion field was absent.
    #[error("incomplete model response: missing {0}")]
    IncompleteResponse(&'static str),
}

// ========================================
// Vision model seam
// ========================================

/// One call to a hosted vision-language model: instruction + image in,
/// free-form text out. Tests substitute a canned implementation.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, prompt: &str, image_data_uri: &str) -> anyhow::Result<String>;
}

/// OpenAI-compatible chat-completions client (vision content parts).
pub struct HostedVisionModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HostedVisionModel {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl VisionModel for HostedVisionModel {
    async fn complete(&self, prompt: &str, image_data_uri: &str) -> anyhow::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("AI API key is not configured"))?;

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_data_uri } }
                ]
            }],
            "max_tokens": 500,
            "temperature": 0.7,
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, "Sending image analysis request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("model request failed: {} {}", status, text);
        }

        let reply: Value = response.json().await?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("model reply has no message content"))?;
        Ok(content.to_string())
    }
}

// ========================================
// Reply parsing
// ========================================

/// Locate the first well-formed `{...}` span in free-form text. The model
/// reply is not guaranteed to be pure JSON; strings and escapes inside the
/// object are honored when balancing braces.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn required_str(value: &Value, field: &'static str) -> Result<String, AnalysisError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AnalysisError::IncompleteResponse(field))
}

/// Parse + validate the model's free-form reply into a suggestion.
/// Absent required fields are an error, never a partially-filled object;
/// an unrecognized condition is dropped rather than rejected.
pub fn parse_suggestion(reply: &str) -> Result<ListingSuggestion, AnalysisError> {
    let span = extract_json_object(reply)
        .ok_or_else(|| AnalysisError::MalformedResponse("no JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(span)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let price_avg = match value.get("price_avg") {
        Some(Value::Number(n)) => n.as_f64(),
        // Some models quote numbers
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(AnalysisError::IncompleteResponse("price_avg"))?;

    Ok(ListingSuggestion {
        title: required_str(&value, "title")?,
        description: required_str(&value, "description")?,
        price_avg,
        category_id: required_str(&value, "category_id")?,
        condition: value
            .get("condition")
            .and_then(Value::as_str)
            .and_then(Condition::parse),
    })
}

/// Full client path: one model call, one parse. Never retries; the caller
/// decides whether the user gets a retry.
pub async fn analyze(
    model: &dyn VisionModel,
    image_data_uri: &str,
) -> Result<ListingSuggestion, AnalysisError> {
    let reply = model
        .complete(LISTING_PROMPT, image_data_uri)
        .await
        .map_err(|e| AnalysisError::Unavailable(e.to_string()))?;
    parse_suggestion(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_chatty_reply() {
        let reply = r#"Sure! {"title":"Red Swatch","price_avg":5} Hope that helps."#;
        assert_eq!(
            extract_json_object(reply),
            Some(r#"{"title":"Red Swatch","price_avg":5}"#)
        );
    }

    #[test]
    fn extracts_nested_object() {
        let reply = r#"prefix {"a":{"b":1},"c":2} suffix"#;
        assert_eq!(extract_json_object(reply), Some(r#"{"a":{"b":1},"c":2}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_balancing() {
        let reply = r#"{"title":"curly } brace","desc":"\" quoted"}"#;
        assert_eq!(extract_json_object(reply), Some(reply));
    }

    #[test]
    fn no_object_yields_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("open only {"), None);
        assert_eq!(extract_json_object(""), None);
    }

    #[test]
    fn parses_complete_suggestion_without_condition() {
        let reply = r#"Sure! {"title":"Red Swatch","description":"A small red square","price_avg":5,"category_id":"Accessories"}"#;
        let s = parse_suggestion(reply).unwrap();
        assert_eq!(s.title, "Red Swatch");
        assert_eq!(s.description, "A small red square");
        assert_eq!(s.price_avg, 5.0);
        assert_eq!(s.category_id, "Accessories");
        assert!(s.condition.is_none());
    }

    #[test]
    fn recognized_condition_is_mapped() {
        let reply = r#"{"title":"t","description":"d","price_avg":1,"category_id":"c","condition":"like new"}"#;
        let s = parse_suggestion(reply).unwrap();
        assert_eq!(s.condition, Some(Condition::LikeNew));
    }

    #[test]
    fn unknown_condition_is_dropped_not_fatal() {
        let reply = r#"{"title":"t","description":"d","price_avg":1,"category_id":"c","condition":"mint"}"#;
        let s = parse_suggestion(reply).unwrap();
        assert!(s.condition.is_none());
    }

    #[test]
    fn missing_required_field_is_incomplete() {
        let reply = r#"{"title":"t","description":"d","category_id":"c"}"#;
        match parse_suggestion(reply) {
            Err(AnalysisError::IncompleteResponse(field)) => assert_eq!(field, "price_avg"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn quoted_price_is_accepted() {
        let reply = r#"{"title":"t","description":"d","price_avg":"12.5","category_id":"c"}"#;
        assert_eq!(parse_suggestion(reply).unwrap().price_avg, 12.5);
    }

    #[test]
    fn reply_without_json_is_malformed() {
        let err = parse_suggestion("I cannot analyze this image.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }
}
