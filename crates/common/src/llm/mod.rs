//! Answer generation
//!
//! Formats the fixed review prompt and sends it to a language model.
//! One call per question: no streaming, no retries.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::retrieval::{Document, ReviewDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;
use std::time::Duration;

/// Prompt sent for every question
pub const REVIEW_PROMPT_TEMPLATE: &str = "
You are an expert in answering questions about a French gastropub.

Here are some relevant reviews: {reviews}

Here is the question to answer: {question}
";

/// Rendered in place of the review list when nothing was retrieved
const NO_REVIEWS: &str = "(no reviews found)";

/// Substitute the reviews and question into [`REVIEW_PROMPT_TEMPLATE`]
///
/// Placeholders are expanded in a single pass, so braces inside review text
/// or the question are copied through untouched.
pub fn render_prompt<D: Document>(question: &str, reviews: &[D]) -> String {
    let reviews = render_reviews(reviews);
    let mut out = String::with_capacity(REVIEW_PROMPT_TEMPLATE.len() + reviews.len() + question.len());
    let mut rest = REVIEW_PROMPT_TEMPLATE;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{reviews}") {
            out.push_str(&reviews);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn render_reviews<D: Document>(reviews: &[D]) -> String {
    if reviews.is_empty() {
        return NO_REVIEWS.to_string();
    }

    let mut out = String::new();
    for review in reviews {
        let _ = write!(out, "\n- {}", review.content());

        let mut attrs: Vec<String> = review
            .metadata()
            .iter()
            .map(|(key, value)| format!("{}: {}", key, scalar_text(value)))
            .collect();
        attrs.sort();
        if !attrs.is_empty() {
            let _ = write!(out, " ({})", attrs.join(", "));
        }
    }
    out
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Produces a natural-language answer grounded in retrieved reviews
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str, reviews: &[ReviewDocument]) -> Result<String>;

    /// Model identifier, used for metrics labels
    fn model_name(&self) -> &str;

    /// Check the model backend is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Ollama completion client (`POST /api/generate`)
pub struct OllamaAnswerer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    ping_timeout: Duration,
}

/// Upper bound for `ping`, independent of the generation timeout
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaAnswerer {
    /// Create a new answerer
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            ping_timeout: DEFAULT_PING_TIMEOUT.min(timeout),
        })
    }

    /// Override how long `ping` waits for `/api/tags`
    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    fn request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::LlmTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::LlmError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl Answerer for OllamaAnswerer {
    async fn answer(&self, question: &str, reviews: &[ReviewDocument]) -> Result<String> {
        let prompt = render_prompt(question, reviews);
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        let result: GenerateResponse = serde_json::from_slice(&body)?;

        Ok(result.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client
            .get(&url)
            .timeout(self.ping_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::LlmTimeout {
                        timeout_ms: self.ping_timeout.as_millis() as u64,
                    }
                } else {
                    self.request_error(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(AppError::LlmError {
                message: format!("Health check returned {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Metadata;
    use serde_json::json;

    fn doc(content: &str, metadata: Value) -> ReviewDocument {
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Metadata::new(),
        };
        ReviewDocument::new(content, metadata)
    }

    #[test]
    fn test_prompt_contains_question_and_reviews() {
        let reviews = vec![
            doc("Steak was tender", json!({ "rating": 5, "date": "2024-05-01" })),
            doc("Too salty", json!({})),
        ];
        let prompt = render_prompt("What about the steak?", &reviews);

        assert!(prompt.contains("French gastropub"));
        assert!(prompt.contains("- Steak was tender (date: 2024-05-01, rating: 5)"));
        assert!(prompt.contains("- Too salty\n"));
        assert!(prompt.ends_with("Here is the question to answer: What about the steak?\n"));
    }

    #[test]
    fn test_prompt_without_reviews() {
        let prompt = render_prompt::<ReviewDocument>("Any vegan options?", &[]);
        assert!(prompt.contains("Here are some relevant reviews: (no reviews found)"));
    }

    #[test]
    fn test_placeholder_text_in_reviews_is_not_expanded() {
        let reviews = vec![doc("mentions {question} literally", json!({}))];
        let prompt = render_prompt("Q?", &reviews);
        assert!(prompt.contains("mentions {question} literally"));
        assert!(prompt.ends_with("Here is the question to answer: Q?\n"));
    }

    #[test]
    fn test_generate_request_shape() {
        let json = serde_json::to_value(GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
        })
        .unwrap();
        assert_eq!(json, json!({ "model": "llama3.2", "prompt": "hi", "stream": false }));
    }

    #[test]
    fn test_generate_response_ignores_extra_fields() {
        let body = json!({ "model": "llama3.2", "response": "It is great.", "done": true });
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.response, "It is great.");
    }

    #[tokio::test]
    async fn test_ping_uses_short_timeout() {
        let base_url = crate::test_support::stalled_server("").await;
        let config = LlmConfig { base_url, timeout_secs: 120, ..LlmConfig::default() };
        let answerer = OllamaAnswerer::new(&config)
            .unwrap()
            .with_ping_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(10), answerer.ping())
            .await
            .expect("ping should not wait for the generation timeout");

        assert!(matches!(result, Err(AppError::LlmTimeout { timeout_ms: 200 })), "got {:?}", result);
    }

    #[test]
    fn test_default_ping_timeout_is_capped() {
        let answerer = OllamaAnswerer::new(&LlmConfig::default()).unwrap();
        assert_eq!(answerer.ping_timeout, DEFAULT_PING_TIMEOUT);

        let config = LlmConfig { timeout_secs: 2, ..LlmConfig::default() };
        let answerer = OllamaAnswerer::new(&config).unwrap();
        assert_eq!(answerer.ping_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_malformed_generate_response_is_serialization_error() {
        let base_url = crate::test_support::canned_server(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 15\r\n\r\n{\"answer\":\"hi\"}",
        )
        .await;
        let config = LlmConfig { base_url, ..LlmConfig::default() };
        let answerer = OllamaAnswerer::new(&config).unwrap();

        let err = answerer.answer("Q?", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)), "got {:?}", err);
    }
}
