// Model-backed start command inference over an Anthropic-style messages API

use crate::decide::{DecideError, Result, StartDecider};
use crate::env::parse_env_var;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Inference backend configuration
#[derive(Debug, Clone)]
pub struct LlmDeciderConfig {
    /// Inference backend URL
    pub endpoint: String,
    /// API key for authentication
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Maximum retry attempts
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub base_retry_delay_ms: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl LlmDeciderConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let required = |name: &str| {
            std::env::var(name).map_err(|_| DecideError::ConfigMissing(name.to_string()))
        };

        Ok(Self {
            endpoint: required("INFERENCE_ENDPOINT")?,
            api_key: required("INFERENCE_API_KEY")?,
            model: required("INFERENCE_MODEL")?,
            max_retries: parse_env_var("INFERENCE_MAX_RETRIES", 3),
            base_retry_delay_ms: parse_env_var("INFERENCE_RETRY_DELAY_MS", 1000),
            request_timeout_secs: parse_env_var("INFERENCE_TIMEOUT_SECS", 120),
            max_output_tokens: parse_env_var("INFERENCE_MAX_TOKENS", 500),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Decision {
    #[serde(default)]
    start_command: Option<String>,
}

/// Asks a model how to start the project
#[derive(Clone)]
pub struct LlmDecider {
    config: LlmDeciderConfig,
    client: Client,
}

impl LlmDecider {
    pub fn new(config: LlmDeciderConfig) -> Result<Self> {
        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout_secs = config.request_timeout_secs,
            max_retries = config.max_retries,
            "initializing model decider"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Send the prompt, retrying with exponential backoff
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let base_delay = Duration::from_millis(self.config.base_retry_delay_ms);
        let mut retries = 0;

        loop {
            debug!(retry = retries, "sending decision request");
            match self.send_request(prompt).await {
                Ok(text) => {
                    info!(
                        latency_ms = start.elapsed().as_millis() as u64,
                        retries, "decision request completed"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    retries += 1;
                    if retries > self.config.max_retries {
                        error!(retries, error = %e, "decision request failed: exhausted retries");
                        return Err(DecideError::Exhausted {
                            retries,
                            last_error: e.to_string(),
                        });
                    }

                    let multiplier = 2u64.saturating_pow(retries - 1);
                    let delay_ms = (base_delay.as_millis() as u64).saturating_mul(multiplier);
                    let delay = Duration::from_millis(delay_ms.min(30_000));
                    warn!(retry = retries, delay_ms = delay.as_millis() as u64, error = %e, "decision request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_request(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));
        let body = MessageRequest {
            model: &self.config.model,
            max_tokens: self.config.max_output_tokens,
            temperature: 0.0,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", &self.config.api_key))
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "received HTTP response");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DecideError::Request(format!("HTTP {status}: {text}")));
        }

        let parsed: MessageResponse = serde_json::from_str(&response.text().await?)?;
        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join(""))
    }
}

/// The rules the model is asked to follow
pub fn decision_prompt(inspection: &str) -> String {
    format!(
        r#"You are a deployment assistant.

Repository structure:
{inspection}

Determine how to start this Node.js project.

Rules:
- If package.json has a "start" script, use "npm start"
- If package.json has "main", use "node <main>"
- If index.js exists, use "node index.js"
- If nothing is found, use null

Return JSON only:
{{ "startCommand": "npm start" }}"#
    )
}

/// Pull `startCommand` out of a reply that may wrap the JSON in prose or fences
pub fn parse_decision(answer: &str) -> Result<Option<String>> {
    let trimmed = answer.trim();
    if trimmed == "null" {
        return Ok(None);
    }
    let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(DecideError::BadAnswer(trimmed.chars().take(200).collect()));
    };
    if close < open {
        return Err(DecideError::BadAnswer(trimmed.chars().take(200).collect()));
    }
    let decision: Decision = serde_json::from_str(&trimmed[open..=close])?;
    Ok(decision
        .start_command
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty()))
}

#[async_trait]
impl StartDecider for LlmDecider {
    async fn decide(&self, inspection: &str) -> Result<Option<String>> {
        let answer = self.complete(&decision_prompt(inspection)).await?;
        let decision = parse_decision(&answer)?;
        info!(start_command = ?decision, "model decision");
        Ok(decision)
    }
}
