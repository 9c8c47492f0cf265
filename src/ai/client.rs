use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::config::AiConfig;
use crate::ai::prompts::{refinement_input, EXTRACTION_SYSTEM, REFINEMENT_SYSTEM};
use crate::ai::util::{parse_json_reply, truncate_to_char_boundary};
use crate::ai::{Completion, JobAi};
use crate::app::{Result, TrickleError};
use crate::domain::{ExtractedJob, RefinedJob};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: AiConfig,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                TrickleError::Config(
                    "AI API key missing (set [ai].api_key or TRICKLE_AI_API_KEY)".to_string(),
                )
            })?;

        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| TrickleError::Config(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// One chat completion. Transport and API errors are logged and reported
    /// as `Unparsed`; only rate limiting is distinguished.
    async fn complete(&self, system: &str, user: &str) -> Completion<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.config.model, bytes = user.len(), "AI chat request");

        let headers = match self.headers() {
            Ok(headers) => headers,
            Err(e) => {
                tracing::error!("{}", e);
                return Completion::Unparsed;
            }
        };

        let response = match self
            .http
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("AI request failed: {}", e);
                return Completion::Unparsed;
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read AI response: {}", e);
                return Completion::Unparsed;
            }
        };

        if is_rate_limited(status, &body) {
            tracing::warn!(status = status.as_u16(), "AI service rate limited");
            return Completion::RateLimited;
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "AI API error: {}", body);
            return Completion::Unparsed;
        }

        match serde_json::from_str::<ChatResponse>(&body)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .and_then(|c| c.message.content)
        {
            Some(content) => Completion::Parsed(content),
            None => {
                tracing::warn!("No content in AI response");
                Completion::Unparsed
            }
        }
    }
}

#[async_trait]
impl JobAi for OpenAiClient {
    async fn extract(&self, blob: &str) -> Completion<ExtractedJob> {
        let input = truncate_to_char_boundary(blob, self.config.max_input_bytes);
        self.complete(EXTRACTION_SYSTEM, input)
            .await
            .and_then(|reply| parse_json_reply(&reply))
    }

    async fn refine(&self, draft: &ExtractedJob) -> Completion<RefinedJob> {
        let input = refinement_input(draft);
        self.complete(REFINEMENT_SYSTEM, &input)
            .await
            .and_then(|reply| parse_json_reply(&reply))
    }
}

/// HTTP 429, or an error body whose type or code names rate limiting.
fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status.is_success() {
        return false;
    }
    serde_json::from_str::<serde_json::Value>(body)
        .map(|v| {
            let error = &v["error"];
            [&error["type"], &error["code"]]
                .iter()
                .filter_map(|f| f.as_str())
                .any(|s| s.to_lowercase().contains("rate_limit"))
        })
        .unwrap_or(false)
}
