//! Chat backends: the strategies for turning a user query into an LLM reply.

use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Upstream, UpstreamError};
use crate::config::{ApiKey, ChatBackendConfig, ChatConfig};

/// Reply used when a completions backend returns no choices.
pub const NO_RESPONSE: &str = "No response received.";

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// The part of a chat completion response we read.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Message,
}

/// Raw hosted-inference request body.
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// A configured chat backend.
///
/// One variant per upstream protocol; which one is live is decided by
/// `[chat.backend] kind` at startup.
#[derive(Debug, Clone)]
pub enum ChatBackend {
    /// POST `{"inputs": query}` to a model URL and relay the raw JSON.
    Inference {
        name: String,
        url: String,
        api_key: ApiKey,
    },
    /// OpenAI-compatible `/chat/completions`; relays `choices[0].message`.
    Completions {
        name: String,
        url: String,
        api_key: ApiKey,
        model: String,
        max_tokens: u32,
        temperature: f64,
        top_p: f64,
    },
}

impl ChatBackend {
    /// Build the backend from a config whose key has been resolved.
    pub fn from_config(config: &ChatConfig, api_key: ApiKey) -> Self {
        let name = config.name.clone();
        match &config.backend {
            ChatBackendConfig::Inference { url } => ChatBackend::Inference {
                name,
                url: url.clone(),
                api_key,
            },
            ChatBackendConfig::Completions {
                url,
                model,
                max_tokens,
                temperature,
                top_p,
            } => ChatBackend::Completions {
                name,
                url: url.clone(),
                api_key,
                model: model.clone(),
                max_tokens: *max_tokens,
                temperature: *temperature,
                top_p: *top_p,
            },
        }
    }

    /// Label used in error details and logs.
    pub fn name(&self) -> &str {
        match self {
            ChatBackend::Inference { name, .. } => name,
            ChatBackend::Completions { name, .. } => name,
        }
    }

    /// Send one query upstream and return the reply payload.
    pub async fn complete(&self, upstream: &Upstream, query: &str) -> Result<Value, UpstreamError> {
        match self {
            ChatBackend::Inference { name, url, api_key } => {
                let request = upstream
                    .http()
                    .post(url)
                    .header(header::AUTHORIZATION, bearer(api_key))
                    .json(&InferenceRequest { inputs: query });
                upstream.send_json(name, request).await
            }
            ChatBackend::Completions {
                name,
                url,
                api_key,
                model,
                max_tokens,
                temperature,
                top_p,
            } => {
                let body = ChatCompletionRequest {
                    model: model.clone(),
                    messages: vec![Message {
                        role: "user".to_string(),
                        content: query.to_string(),
                    }],
                    max_tokens: *max_tokens,
                    temperature: *temperature,
                    top_p: *top_p,
                };
                let request = upstream
                    .http()
                    .post(completions_url(url))
                    .header(header::AUTHORIZATION, bearer(api_key))
                    .json(&body);
                let raw = upstream.send_json(name, request).await?;
                first_message(name, raw)
            }
        }
    }
}

fn bearer(api_key: &ApiKey) -> String {
    format!("Bearer {}", api_key.expose_secret())
}

fn completions_url(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

/// Pull `choices[0].message` out of a completion response.
fn first_message(backend: &str, raw: Value) -> Result<Value, UpstreamError> {
    let response: ChatCompletionResponse = serde_json::from_value(raw).map_err(|e| {
        tracing::error!(backend = %backend, error = %e, "Unexpected completion shape");
        UpstreamError::new(
            backend,
            super::FailureKind::Decode,
            format!("unexpected completion response: {}", e),
        )
    })?;

    match response.choices.into_iter().next() {
        Some(choice) => Ok(serde_json::json!({
            "role": choice.message.role,
            "content": choice.message.content,
        })),
        None => {
            tracing::warn!(backend = %backend, "Completion returned no choices");
            Ok(Value::String(NO_RESPONSE.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_joins_cleanly() {
        assert_eq!(
            completions_url("https://router.test/v1/"),
            "https://router.test/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://router.test/v1"),
            "https://router.test/v1/chat/completions"
        );
    }

    #[test]
    fn test_first_message_extracts_role_and_content() {
        let raw = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "gm"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        });
        let message = first_message("DeepSeek", raw).unwrap();
        assert_eq!(message, serde_json::json!({"role": "assistant", "content": "gm"}));
    }

    #[test]
    fn test_first_message_empty_choices() {
        let raw = serde_json::json!({"choices": []});
        assert_eq!(
            first_message("DeepSeek", raw).unwrap(),
            Value::String(NO_RESPONSE.to_string())
        );
    }

    #[test]
    fn test_first_message_missing_choices() {
        let raw = serde_json::json!({"object": "chat.completion"});
        assert_eq!(
            first_message("DeepSeek", raw).unwrap(),
            Value::String(NO_RESPONSE.to_string())
        );
    }

    #[test]
    fn test_first_message_malformed_is_decode_error() {
        let raw = serde_json::json!({"choices": [{"text": "legacy"}]});
        let err = first_message("DeepSeek", raw).unwrap_err();
        assert_eq!(err.kind, super::super::FailureKind::Decode);
        assert!(err.to_string().starts_with("DeepSeek API error:"));
    }

    #[test]
    fn test_from_config_selects_variant() {
        let config: ChatConfig = toml::from_str(
            r#"
            name = "llama"
            [backend]
            kind = "inference"
            url = "https://inference.test/models/llama"
            "#,
        )
        .unwrap();
        let backend = ChatBackend::from_config(&config, ApiKey::from("k"));
        assert!(matches!(backend, ChatBackend::Inference { .. }));
        assert_eq!(backend.name(), "llama");
    }

    #[test]
    fn test_backend_debug_hides_key() {
        let backend = ChatBackend::from_config(&ChatConfig::default(), ApiKey::from("sk-live-123"));
        let debug = format!("{:?}", backend);
        assert!(!debug.contains("sk-live-123"));
    }
}
