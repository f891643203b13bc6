//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI.
//!
//! Two endpoints are used depending on the request:
//!
//! - **Chat Completions** (`/v1/chat/completions`) through `openai_rust2` for plain turns. When
//!   the request asks for JSON output the call goes through `reqwest` instead so that
//!   `response_format: {"type": "json_object"}` can be set.
//! - **Responses** (`/v1/responses`) through `reqwest` when the request enables tool use. The
//!   `web_search` tool is attached and the client reports whether the model actually issued a
//!   `web_search_call` while answering.
//!
//! # Example
//!
//! ```rust,no_run
//! use roundtable::clients::openai::OpenAIClient;
//! use roundtable::client_wrapper::{ClientWrapper, CompletionRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAIClient::from_env("gpt-4o-mini")?;
//!     let request = CompletionRequest::new(vec![Message::user("Say hello in five words.")])
//!         .with_temperature(0.5)
//!         .with_tool_use(true);
//!     let completion = client.complete(&request).await?;
//!     println!("{} (searched: {})", completion.content, completion.used_tool);
//!     Ok(())
//! }
//! ```
use async_trait::async_trait;
use openai_rust2 as openai_rust;
use serde::{Deserialize, Serialize};

use crate::roundtable::client_wrapper::{
    ClientError, ClientWrapper, Completion, CompletionRequest, TokenUsage,
};
use crate::roundtable::clients::common::{
    get_shared_http_client, send_and_track, to_chat_messages,
};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Optional environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client wrapper for OpenAI's Chat Completions and Responses APIs.
pub struct OpenAIClient {
    /// SDK client used for chat completions.
    client: openai_rust::Client,
    /// Raw HTTP client used for the Responses API.
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and model name.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client(
                secret_key,
                get_shared_http_client().clone(),
            ),
            http: get_shared_http_client().clone(),
            secret_key: secret_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model_name.to_string(),
        }
    }

    /// Construct a client targeting a custom OpenAI compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                get_shared_http_client().clone(),
                base_url,
            ),
            http: get_shared_http_client().clone(),
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model_name.to_string(),
        }
    }

    /// Build a client from `OPENAI_API_KEY` (and `OPENAI_BASE_URL` when set).
    pub fn from_env(model_name: &str) -> Result<Self, ClientError> {
        let key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::MissingCredentials(API_KEY_VAR.to_string()))?;
        Ok(match std::env::var(BASE_URL_VAR) {
            Ok(base_url) if !base_url.trim().is_empty() => {
                Self::new_with_base_url(&key, model_name, &base_url)
            }
            _ => Self::new_with_model_string(&key, model_name),
        })
    }

    async fn complete_chat(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        let (content, usage) = send_and_track(
            &self.client,
            &self.model,
            to_chat_messages(&request.messages),
            Some("/v1/chat/completions".to_string()),
            request.temperature,
            request.max_tokens,
        )
        .await?;

        Ok(Completion {
            content: content.trim().to_string(),
            used_tool: false,
            usage: Some(usage),
        })
    }

    async fn complete_json(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        let body = JsonChatRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|msg| ResponsesInput {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let text = self.post_json(&url, &body).await?;
        parse_chat_body(&text)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                log::error!("OpenAIClient::post_json({}): {}", url, err);
                ClientError::Http(err.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;

        if !status.is_success() {
            log::error!(
                "OpenAIClient::post_json({}): OpenAI API Error {}: {}",
                url,
                status,
                text
            );
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    async fn complete_with_search(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, ClientError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: request
                .messages
                .iter()
                .map(|msg| ResponsesInput {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
            temperature: request.temperature,
            tools: vec![ResponsesTool { kind: "web_search" }],
            max_output_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/responses", self.base_url);
        let text = self.post_json(&url, &body).await?;
        parse_responses_body(&text)
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        if request.tool_use {
            self.complete_with_search(request).await
        } else if request.json_output {
            self.complete_json(request).await
        } else {
            self.complete_chat(request).await
        }
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<ResponsesInput<'a>>,
    temperature: f32,
    tools: Vec<ResponsesTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
struct JsonChatRequest<'a> {
    model: &'a str,
    messages: Vec<ResponsesInput<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ResponsesInput<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponsesTool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

/// Decode a Chat Completions body into a [`Completion`].
pub fn parse_chat_body(body: &str) -> Result<Completion, ClientError> {
    let parsed: ChatBody =
        serde_json::from_str(body).map_err(|err| ClientError::Decode(err.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ClientError::Decode("response contained no choices".into()))?;

    Ok(Completion {
        content: content.trim().to_string(),
        used_tool: false,
        usage: parsed.usage.map(|usage| TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    })
}

/// Decode a Responses API body into a [`Completion`].
///
/// The text is the concatenation of every `output_text` part of every `message` item, and
/// `used_tool` is set when any output item is a `web_search_call`.
pub fn parse_responses_body(body: &str) -> Result<Completion, ClientError> {
    let parsed: ResponsesBody =
        serde_json::from_str(body).map_err(|err| ClientError::Decode(err.to_string()))?;

    let used_tool = parsed
        .output
        .iter()
        .any(|item| item.kind == "web_search_call");

    let mut content = String::new();
    for item in parsed.output.iter().filter(|item| item.kind == "message") {
        for part in item.content.iter().filter(|part| part.kind == "output_text") {
            if let Some(text) = &part.text {
                content.push_str(text);
            }
        }
    }

    let usage = parsed.usage.map(|usage| TokenUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
    });

    Ok(Completion {
        content: content.trim().to_string(),
        used_tool,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_responses_body_detects_web_search() {
        let body = r#"{
            "output": [
                {"type": "web_search_call", "id": "ws_1", "status": "completed"},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Retaining walls last decades. ", "annotations": []},
                    {"type": "output_text", "text": "Costs vary."}
                ]}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 30, "total_tokens": 150}
        }"#;

        let completion = parse_responses_body(body).unwrap();
        assert!(completion.used_tool);
        assert_eq!(completion.content, "Retaining walls last decades. Costs vary.");
        assert_eq!(completion.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_parse_responses_body_without_search() {
        let body = r#"{"output": [{"type": "message", "content": [{"type": "output_text", "text": "  Plain answer.  "}]}]}"#;
        let completion = parse_responses_body(body).unwrap();
        assert!(!completion.used_tool);
        assert_eq!(completion.content, "Plain answer.");
        assert!(completion.usage.is_none());
    }

    #[test]
    fn test_parse_chat_body_reads_first_choice() {
        let body = r#"{
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"ok\": true}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        }"#;
        let completion = parse_chat_body(body).unwrap();
        assert_eq!(completion.content, "{\"ok\": true}");
        assert_eq!(completion.usage.unwrap().input_tokens, 10);

        let empty = parse_chat_body(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(empty, ClientError::Decode(_)));
    }

    #[test]
    fn test_parse_responses_body_rejects_garbage() {
        let err = parse_responses_body("not json").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
